//! `kyvert convert` — translate a legacy policy file to a
//! `ValidatingPolicy` document.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use kyvert_core::error::ConvertError;

/// Arguments for `kyvert convert`.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Legacy policy document to convert.
    pub policy: PathBuf,

    /// Write the converted document here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Convert one policy file. Exit code 0 on success, 1 when the policy is
/// rejected; file-system failures surface as `Err`.
pub fn run_convert(args: &ConvertArgs) -> anyhow::Result<u8> {
    let input = fs::read_to_string(&args.policy)
        .with_context(|| format!("reading {}", args.policy.display()))?;

    match kyvert_compiler::convert(&input) {
        Ok(yaml) => {
            match &args.output {
                Some(path) => {
                    fs::write(path, yaml.as_bytes())
                        .with_context(|| format!("writing {}", path.display()))?;
                    tracing::info!(path = %path.display(), "converted policy written");
                }
                None => print!("{yaml}"),
            }
            Ok(0)
        }
        Err(err) => {
            eprintln!("{}", render_error(&err));
            Ok(1)
        }
    }
}

/// One-line diagnostic for a rejected conversion. The error `Display`
/// already embeds the field path where one applies.
pub fn render_error(err: &ConvertError) -> String {
    format!("error[{}]: {err}", err.code())
}

#[cfg(test)]
mod tests {
    use super::*;

    use kyvert_core::path::FieldPath;

    #[test]
    fn rendered_error_carries_code_and_path() {
        let err = ConvertError::UnsupportedConstruct {
            path: FieldPath::root().key("spec").key("rules").index(0).key("mutate"),
            construct: "mutate rule".to_string(),
        };
        let line = render_error(&err);
        assert!(line.starts_with("error[UNSUPPORTED_CONSTRUCT]:"), "{line}");
        assert!(line.contains("spec.rules[0].mutate"), "{line}");
    }

    #[test]
    fn rendered_conversion_error_has_no_path() {
        let err = ConvertError::Conversion("rules disagree on match constraints".to_string());
        assert_eq!(
            render_error(&err),
            "error[CONVERSION_ERROR]: conversion error: rules disagree on match constraints"
        );
    }
}
