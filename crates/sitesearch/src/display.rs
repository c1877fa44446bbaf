use std::path::Path;

use sitesearch_core::{Index, SearchResult};

const RULER_WIDTH: usize = 100;

pub fn print_instructions() {
    println!();
    println!("How to search:");
    println!("Enter one or more words separated by whitespace to get the documents that");
    println!("contain all of them.");
    println!();
    println!("The boolean keywords are AND, OR and NOT (or `&`, `|` and `!`). NOT is a unary");
    println!("operator of highest priority, AND binds tighter than OR, parentheses group.");
    println!();
    println!("To search for an exact phrase, put it between double quotes.");
    println!();
}

/// Prints the ranked results between two rulers, paths relative to the root
/// the user asked to index, scores truncated to whole numbers.
pub fn print_results(index: &Index, results: &[SearchResult], root: &Path, limit: usize) {
    println!();
    println!("Search results:");
    println!("{}", "*".repeat(RULER_WIDTH));

    if results.is_empty() {
        println!("No results for this query.");
    }
    for (rank, result) in results.iter().take(limit).enumerate() {
        let path = index.document_path(result.document).unwrap_or(Path::new("?"));
        let path = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
        let path = path.display().to_string();
        println!("{}) {:<40} | {:>8} |", rank + 1, path, result.score as i64);
    }

    println!("{}", "*".repeat(RULER_WIDTH));
    println!();
}
