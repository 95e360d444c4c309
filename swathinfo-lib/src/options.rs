use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::nav::LonFlip;
use crate::report::Style;

/// Settings shared by every file in a run.
///
/// # Example
/// ```
/// use swathinfo::{LonFlip, Options, Style};
///
/// let options = Options::builder()
///     .lonflip(LonFlip::East)
///     .style(Style::Json)
///     .threads(4)
///     .build();
/// assert_eq!(options.threads, Some(4));
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, TypedBuilder, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Longitude convention decoders normalize to.
    #[builder(default)]
    pub lonflip: LonFlip,
    #[builder(default)]
    pub style: Style,
    /// Worker threads for multi-file batches. `None` lets rayon decide.
    #[builder(default, setter(strip_option))]
    pub threads: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = Options::builder().build();
        assert_eq!(options, Options::default());
        assert_eq!(options.lonflip, LonFlip::Centered);
        assert_eq!(options.style, Style::Text);
        assert_eq!(options.threads, None);
    }

    #[test]
    fn deserialize_partial() {
        let options: Options = serde_json::from_str(r#"{"style": "json"}"#).unwrap();
        assert_eq!(options.style, Style::Json);
        assert_eq!(options.lonflip, LonFlip::Centered);
    }
}
