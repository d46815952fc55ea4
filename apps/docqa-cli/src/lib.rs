//! Helpers behind the `docqa` binary: input discovery and text rendering.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use docqa_hybrid::{RerankStatus, Retrieval, StrategyStatus};

const TEXT_EXTENSIONS: [&str; 4] = ["txt", "md", "markdown", "text"];

pub fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| TEXT_EXTENSIONS.iter().any(|t| t.eq_ignore_ascii_case(e)))
}

/// Explicit files in the given order, then text files under `dir` sorted by path.
pub fn collect_inputs(files: &[PathBuf], dir: Option<&Path>) -> Vec<PathBuf> {
    let mut inputs: Vec<PathBuf> = files.to_vec();
    if let Some(dir) = dir {
        let mut found: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file() && is_text_file(e.path()))
            .map(walkdir::DirEntry::into_path)
            .collect();
        found.sort();
        inputs.extend(found);
    }
    inputs
}

pub fn render_text(retrieval: &Retrieval) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Search method: {}  Confidence: {:.2}", retrieval.search_method, retrieval.confidence);
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", retrieval.context.text);
    let _ = writeln!(out);
    let _ = writeln!(out, "Citations:");
    for c in &retrieval.context.citations {
        match c.page_number {
            Some(page) => { let _ = writeln!(out, "  [{}] {} p.{} ({:.2})", c.index, c.filename, page, c.confidence); }
            None => { let _ = writeln!(out, "  [{}] {} ({:.2})", c.index, c.filename, c.confidence); }
        }
    }
    let strategies: Vec<String> = retrieval
        .outcomes
        .iter()
        .map(|o| match &o.status {
            StrategyStatus::Ok(n) => format!("{}={n}", o.strategy),
            StrategyStatus::TimedOut => format!("{}=timeout", o.strategy),
            StrategyStatus::Failed(_) => format!("{}=failed", o.strategy),
            StrategyStatus::Recovered(n) => format!("{}={n}(recovered)", o.strategy),
            StrategyStatus::Skipped => format!("{}=skipped", o.strategy),
        })
        .collect();
    let _ = writeln!(out, "Strategies: {}", strategies.join(" "));
    match &retrieval.rerank {
        RerankStatus::Disabled => {}
        RerankStatus::Applied => { let _ = writeln!(out, "Rerank: applied"); }
        RerankStatus::Failed(reason) => { let _ = writeln!(out, "Rerank: failed ({reason}), fused order kept"); }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_text_files_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("nested")).unwrap();
        std::fs::write(tmp.path().join("b.txt"), "b").unwrap();
        std::fs::write(tmp.path().join("nested/a.md"), "a").unwrap();
        std::fs::write(tmp.path().join("image.png"), [0u8, 1]).unwrap();

        let explicit = PathBuf::from("/somewhere/first.txt");
        let inputs = collect_inputs(std::slice::from_ref(&explicit), Some(tmp.path()));
        assert_eq!(inputs[0], explicit);
        assert_eq!(inputs.len(), 3);
        assert!(inputs[1].ends_with("b.txt"));
        assert!(inputs[2].ends_with("nested/a.md"));
    }
}
