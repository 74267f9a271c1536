/// Pick the model to use for the lifetime of the process.
///
/// Each preference is a model-family substring tried in order against the
/// candidates in the order the service listed them. With no match the first
/// candidate wins, and with no candidates at all `fallback` is returned.
pub fn choose_model(candidates: &[String], preferences: &[String], fallback: &str) -> String {
    preferences
        .iter()
        .find_map(|family| candidates.iter().find(|name| name.contains(family.as_str())))
        .or_else(|| candidates.first())
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}
