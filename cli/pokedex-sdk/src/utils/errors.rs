/// Formats an error and all of its sources as a single line.
///
/// `"could not fetch 'https://...': error sending request: connection refused"`
pub fn display_chain(mut err: &dyn std::error::Error) -> String {
    let mut fmt = err.to_string();
    while let Some(source) = err.source() {
        fmt = format!("{fmt}: {source}");
        err = source;
    }

    fmt
}
