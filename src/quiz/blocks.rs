use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{Question, MAX_OPTIONS};

/// A main menu block: one or more bank files taken as a single pool.
pub struct BlockSpec {
    pub key: &'static str,
    pub title: &'static str,
    pub files: &'static [&'static str],
}

/// The five main blocks. Block 2 is a group whose sub-block files can also
/// be taken separately from its submenu.
pub static MAIN_BLOCKS: [BlockSpec; 5] = [
    BlockSpec {
        key: "b1",
        title: "1 блок — Аудит",
        files: &["block1_audit.json"],
    },
    BlockSpec {
        key: "b2",
        title: "2 блок — Законодавство",
        files: &[
            "block2_1_constitution.json",
            "block2_2_civil_service.json",
            "block2_3_mku.json",
            "block2_4_corruption.json",
        ],
    },
    BlockSpec {
        key: "b3",
        title: "3 блок — Митна вартість",
        files: &["block3_value.json"],
    },
    BlockSpec {
        key: "b4",
        title: "4 блок — Походження",
        files: &["block4_origin.json"],
    },
    BlockSpec {
        key: "b5",
        title: "5 блок — Платежі",
        files: &["block5_payments.json"],
    },
];

pub fn main_block(key: &str) -> Option<&'static BlockSpec> {
    MAIN_BLOCKS.iter().find(|b| b.key == key)
}

/// Menu labels for the sub-block files of block 2.
pub fn subblock_label(file: &str) -> Option<&'static str> {
    match file {
        "block2_1_constitution.json" => Some("2.1 Конституція"),
        "block2_2_civil_service.json" => Some("2.2 Держслужба"),
        "block2_3_mku.json" => Some("2.3 МКУ"),
        "block2_4_corruption.json" => Some("2.4 Корупція"),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("missing data dir: {0}")]
    MissingDir(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// One loaded bank file.
#[derive(Debug, Clone)]
pub struct BlockFile {
    pub file: String,
    pub title: String,
    pub questions: Vec<Question>,
}

#[derive(serde::Deserialize)]
struct RawBank {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    questions: Vec<RawQuestion>,
}

#[derive(serde::Deserialize)]
struct RawQuestion {
    #[serde(default)]
    q: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    correct_index: i64,
    #[serde(default)]
    explanation: String,
}

impl BlockFile {
    /// Parses one bank. Questions with an empty prompt, fewer than two
    /// options or more options than there are letter labels are skipped,
    /// an out-of-range `correct_index` falls back to 0, and a missing title
    /// falls back to the file stem.
    fn parse(file: &str, json: &str) -> Result<Self, serde_json::Error> {
        let raw: RawBank = serde_json::from_str(json)?;
        let title = raw
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| stem(file).to_string());

        let mut questions = Vec::new();
        for item in raw.questions {
            let prompt = item.q.trim().to_string();
            let options: Vec<String> = item.options.iter().map(|o| o.trim().to_string()).collect();
            if prompt.is_empty() || options.len() < 2 || options.len() > MAX_OPTIONS {
                continue;
            }
            let correct_index = if item.correct_index < 0 || item.correct_index as usize >= options.len() {
                0
            } else {
                item.correct_index as usize
            };
            questions.push(Question {
                prompt,
                options,
                correct_index,
                explanation: item.explanation.trim().to_string(),
            });
        }

        Ok(Self {
            file: file.to_string(),
            title,
            questions,
        })
    }
}

fn stem(file: &str) -> &str {
    Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file)
}

/// All bank files from the data directory, keyed by file name. Loaded once
/// at startup and shared read-only with the handlers.
pub struct Blocks {
    files: HashMap<String, BlockFile>,
}

impl Blocks {
    pub fn load(dir: &Path) -> Result<Self, LoadError> {
        if !dir.is_dir() {
            return Err(LoadError::MissingDir(dir.to_path_buf()));
        }
        let entries = fs::read_dir(dir).map_err(|source| LoadError::Read {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files = HashMap::new();
        for entry in entries {
            let entry = entry.map_err(|source| LoadError::Read {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.to_lowercase().ends_with(".json") {
                continue;
            }
            let json = fs::read_to_string(&path).map_err(|source| LoadError::Read {
                path: path.clone(),
                source,
            })?;
            let block = BlockFile::parse(name, &json).map_err(|source| LoadError::Parse {
                path: path.clone(),
                source,
            })?;
            files.insert(name.to_string(), block);
        }
        Ok(Self { files })
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn get(&self, file: &str) -> Option<&BlockFile> {
        self.files.get(file)
    }

    /// Concatenates the questions of the listed files in order, skipping
    /// files that were not loaded.
    pub fn merge(&self, files: &[&str]) -> Vec<Question> {
        let mut out = Vec::new();
        for file in files {
            if let Some(block) = self.files.get(*file) {
                out.extend(block.questions.iter().cloned());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_valid_questions_and_trims_text() {
        let json = r#"{
            "title": "Тестовий блок",
            "questions": [
                {"q": "  Перше питання?  ", "options": [" так ", " ні "], "correct_index": 1},
                {"q": "Друге?", "options": ["а", "б", "в"], "correct_index": 0, "explanation": " бо так "}
            ]
        }"#;
        let block = BlockFile::parse("block1_audit.json", json).unwrap();
        assert_eq!(block.title, "Тестовий блок");
        assert_eq!(block.questions.len(), 2);
        assert_eq!(block.questions[0].prompt, "Перше питання?");
        assert_eq!(block.questions[0].options, vec!["так", "ні"]);
        assert_eq!(block.questions[0].correct_index, 1);
        assert_eq!(block.questions[1].explanation, "бо так");
    }

    #[test]
    fn parse_skips_degenerate_questions() {
        let json = r#"{
            "questions": [
                {"q": "   ", "options": ["а", "б"]},
                {"q": "одна відповідь", "options": ["а"]},
                {"q": "ок", "options": ["а", "б"]}
            ]
        }"#;
        let block = BlockFile::parse("bank.json", json).unwrap();
        assert_eq!(block.questions.len(), 1);
        assert_eq!(block.questions[0].prompt, "ок");
    }

    #[test]
    fn parse_skips_questions_with_more_options_than_letters() {
        let options: Vec<String> = (0..27).map(|i| format!("\"варіант {i}\"")).collect();
        let json = format!(
            r#"{{"questions": [
                {{"q": "задовге", "options": [{}]}},
                {{"q": "ок", "options": ["а", "б"]}}
            ]}}"#,
            options.join(", "),
        );
        let block = BlockFile::parse("bank.json", &json).unwrap();
        assert_eq!(block.questions.len(), 1);
        assert_eq!(block.questions[0].prompt, "ок");
    }

    #[test]
    fn parse_clamps_out_of_range_correct_index() {
        let json = r#"{
            "questions": [
                {"q": "q1", "options": ["а", "б"], "correct_index": 5},
                {"q": "q2", "options": ["а", "б"], "correct_index": -1}
            ]
        }"#;
        let block = BlockFile::parse("bank.json", json).unwrap();
        assert_eq!(block.questions[0].correct_index, 0);
        assert_eq!(block.questions[1].correct_index, 0);
    }

    #[test]
    fn missing_title_falls_back_to_file_stem() {
        let block = BlockFile::parse("block3_value.json", r#"{"questions": []}"#).unwrap();
        assert_eq!(block.title, "block3_value");
    }

    #[test]
    fn merge_concatenates_in_order_and_skips_missing_files() {
        let a = BlockFile::parse(
            "a.json",
            r#"{"questions": [{"q": "a1", "options": ["x", "y"]}]}"#,
        )
        .unwrap();
        let b = BlockFile::parse(
            "b.json",
            r#"{"questions": [{"q": "b1", "options": ["x", "y"]}, {"q": "b2", "options": ["x", "y"]}]}"#,
        )
        .unwrap();
        let mut files = HashMap::new();
        files.insert(a.file.clone(), a);
        files.insert(b.file.clone(), b);
        let blocks = Blocks { files };

        let merged = blocks.merge(&["a.json", "missing.json", "b.json"]);
        let prompts: Vec<_> = merged.iter().map(|q| q.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["a1", "b1", "b2"]);
    }

    #[test]
    fn every_main_block_file_of_block2_has_a_label() {
        let b2 = main_block("b2").unwrap();
        for file in b2.files {
            assert!(subblock_label(file).is_some(), "{file} has no label");
        }
        assert!(subblock_label("block1_audit.json").is_none());
    }
}
