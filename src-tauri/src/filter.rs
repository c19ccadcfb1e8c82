/// Case-insensitive substring match used by every list search box.
/// An empty or missing query matches everything.
pub fn matches_query(query: Option<&str>, fields: &[&str]) -> bool {
    let needle = match query.map(str::trim) {
        Some(q) if !q.is_empty() => q.to_lowercase(),
        _ => return true,
    };
    fields
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}
