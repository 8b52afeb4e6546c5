use std::path::PathBuf;

use crate::{
    api::models::SubmissionRequest,
    core::domain::{Language, Submission, TestSelection},
};

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Unknown language: {value}")]
    UnknownLanguage { value: String },

    #[error("Unknown test selection: {value} (expected sample, unit or all)")]
    UnknownSelection { value: String },

    #[error("Failed to read source file {path}: {source}")]
    SourceFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A request validated into domain types.
#[derive(Clone, Debug)]
pub struct JudgeRequest {
    pub problem: PathBuf,
    pub submission: Submission,
}

impl TryFrom<SubmissionRequest> for JudgeRequest {
    type Error = ConversionError;

    fn try_from(req: SubmissionRequest) -> Result<Self, ConversionError> {
        if req.problem.as_os_str().is_empty() {
            return Err(ConversionError::MissingField {
                field: "problem".to_string(),
            });
        }
        let language: Language = req
            .language
            .parse()
            .map_err(|value| ConversionError::UnknownLanguage { value })?;
        let selection = match req.tests {
            Some(tests) => tests
                .parse::<TestSelection>()
                .map_err(|value| ConversionError::UnknownSelection { value })?,
            None => TestSelection::default(),
        };
        let source = match (req.source, req.source_file) {
            (Some(source), _) => source,
            (None, Some(path)) => std::fs::read_to_string(&path)
                .map_err(|source| ConversionError::SourceFile { path, source })?,
            (None, None) => {
                return Err(ConversionError::MissingField {
                    field: "source".to_string(),
                });
            }
        };

        Ok(Self {
            problem: req.problem,
            submission: Submission::new(language, source, selection),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SubmissionRequest {
        SubmissionRequest {
            problem: PathBuf::from("problems/two-sum"),
            language: "py".to_string(),
            source: Some("print(1)".to_string()),
            source_file: None,
            tests: Some("ALL".to_string()),
        }
    }

    #[test]
    fn test_valid_request() {
        let parsed = JudgeRequest::try_from(request()).unwrap();

        assert_eq!(parsed.problem, PathBuf::from("problems/two-sum"));
        assert_eq!(parsed.submission.language, Language::Python);
        assert_eq!(parsed.submission.selection, TestSelection::All);
        assert_eq!(parsed.submission.source, "print(1)");
    }

    #[test]
    fn test_selection_defaults_to_sample() {
        let parsed = JudgeRequest::try_from(SubmissionRequest {
            tests: None,
            ..request()
        })
        .unwrap();
        assert_eq!(parsed.submission.selection, TestSelection::Sample);
    }

    #[test]
    fn test_source_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.c");
        std::fs::write(&path, "int main(void) { return 0; }").unwrap();

        let parsed = JudgeRequest::try_from(SubmissionRequest {
            source: None,
            source_file: Some(path),
            ..request()
        })
        .unwrap();
        assert!(parsed.submission.source.starts_with("int main"));
    }

    #[test]
    fn test_invalid_requests() {
        let unknown = JudgeRequest::try_from(SubmissionRequest {
            language: "cobol".to_string(),
            ..request()
        });
        assert!(matches!(unknown, Err(ConversionError::UnknownLanguage { value }) if value == "cobol"));

        let selection = JudgeRequest::try_from(SubmissionRequest {
            tests: Some("everything".to_string()),
            ..request()
        });
        assert!(matches!(selection, Err(ConversionError::UnknownSelection { .. })));

        let missing = JudgeRequest::try_from(SubmissionRequest {
            source: None,
            ..request()
        });
        assert!(matches!(missing, Err(ConversionError::MissingField { field }) if field == "source"));
    }

    #[test]
    fn test_batch_file_shape() {
        let raw = r#"[{"problem": "p", "language": "c++", "source": "int main(){}", "tests": "unit"}]"#;
        let requests: Vec<SubmissionRequest> = serde_json::from_str(raw).unwrap();
        let parsed = JudgeRequest::try_from(requests[0].clone()).unwrap();
        assert_eq!(parsed.submission.language, Language::Cpp);
        assert_eq!(parsed.submission.selection, TestSelection::Unit);
    }
}
