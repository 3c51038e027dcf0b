use crate::status::StatusKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Text(&'static str),
    ExitCode(i32),
}

impl Marker {
    fn matches(self, output: &str, exit_code: i32) -> bool {
        match self {
            Self::Text(text) => !text.is_empty() && output.contains(text),
            Self::ExitCode(code) => code == exit_code,
        }
    }
}

/// Walk `markers` in order and return the kind of the first match, falling
/// back to `BackendFail`.
#[must_use]
pub fn classify(markers: &[(Marker, StatusKind)], output: &str, exit_code: i32) -> StatusKind {
    markers
        .iter()
        .find(|(marker, _)| marker.matches(output, exit_code))
        .map_or(StatusKind::BackendFail, |(_, kind)| *kind)
}
