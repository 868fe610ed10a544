/// Marker carried by the placeholder source shown before anything was generated.
pub const PLACEHOLDER_MARKER: &str = "Click 'Generate ATS-Optimized CV'";

/// Initial document source. Never sent to the compile service.
pub const PLACEHOLDER_SOURCE: &str = "% Click 'Generate ATS-Optimized CV' to create a tailored LaTeX CV.\n\
% The generated source will appear here and compile automatically.\n";

/// True when `source` is the placeholder or carries no content at all.
pub fn is_placeholder(source: &str) -> bool {
    source.trim().is_empty() || source.contains(PLACEHOLDER_MARKER)
}
