use clap::{Parser, Subcommand};
use colored::Colorize;
use ignore::WalkBuilder;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Token sets are compared O(n^2) times across a corpus, so use a fast hasher.
type TokenSet = HashSet<String, ahash::RandomState>;

/// patsim - Duplicate and similarity detection for markdown pattern libraries
#[derive(Parser)]
#[command(name = "patsim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true, default_value = ".patsim.toml")]
    config: PathBuf,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare one pattern file against the existing corpus
    Check {
        /// Pattern file to check
        file: PathBuf,

        /// Similarity threshold for reporting (0.0 to 1.0)
        #[arg(short, long, default_value = "0.5")]
        threshold: f64,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Export report to Markdown file
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// Patterns directory
        #[arg(short = 'd', long, default_value = "patterns")]
        patterns_dir: PathBuf,
    },

    /// Check all patterns against each other
    All {
        /// Similarity threshold for reporting (0.0 to 1.0)
        #[arg(short, long, default_value = "0.5")]
        threshold: f64,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Export report to Markdown file
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// Patterns directory
        #[arg(short = 'd', long, default_value = "patterns")]
        patterns_dir: PathBuf,
    },

    /// Show a full similarity breakdown for two pattern files
    Diff {
        /// First pattern file
        file1: PathBuf,

        /// Second pattern file
        file2: PathBuf,
    },
}

// Configuration: aggregation weights and action band cutoffs. Loaded from
// .patsim.toml when present, defaults otherwise.

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
#[serde(default)]
struct Weights {
    tag: f64,
    title: f64,
    category: f64,
    content: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Weights {
            tag: 0.30,
            title: 0.20,
            category: 0.15,
            content: 0.35,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
#[serde(default)]
struct ActionBands {
    merge: f64,
    review: f64,
    check: f64,
    related: f64,
}

impl Default for ActionBands {
    fn default() -> Self {
        ActionBands {
            merge: 0.80,
            review: 0.70,
            check: 0.60,
            related: 0.50,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default)]
#[serde(default)]
struct SimilarityConfig {
    weights: Weights,
    actions: ActionBands,
}

impl SimilarityConfig {
    /// Weights must form a convex combination and bands must be ordered,
    /// otherwise totals leave [0, 1] and classification becomes ambiguous.
    fn validate(&self) -> Result<(), String> {
        let w = &self.weights;
        for (name, value) in [
            ("tag", w.tag),
            ("title", w.title),
            ("category", w.category),
            ("content", w.content),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("weight '{}' must be in [0, 1], got {}", name, value));
            }
        }
        let sum = w.tag + w.title + w.category + w.content;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(format!("weights must sum to 1.0, got {}", sum));
        }

        let b = &self.actions;
        for (name, value) in [
            ("merge", b.merge),
            ("review", b.review),
            ("check", b.check),
            ("related", b.related),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("action band '{}' must be in [0, 1], got {}", name, value));
            }
        }
        if !(b.merge >= b.review && b.review >= b.check && b.check >= b.related) {
            return Err("action bands must be ordered merge >= review >= check >= related".to_string());
        }
        Ok(())
    }
}

fn load_config(path: &Path) -> Result<SimilarityConfig, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Ok(SimilarityConfig::default());
    }
    let content = fs::read_to_string(path)?;
    let config: SimilarityConfig =
        toml::from_str(&content).map_err(|e| format!("{}: {}", path.display(), e))?;
    config
        .validate()
        .map_err(|e| format!("{}: {}", path.display(), e))?;
    Ok(config)
}

// Fixed keyword tables, kept as data so they can be tested and extended
// independently of control flow.

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for",
    "of", "with", "by", "from", "as", "is", "was", "are", "were", "be",
    "been", "being", "have", "has", "had", "do", "does", "did", "will",
    "would", "could", "should", "may", "might", "must", "can", "this",
    "that", "these", "those", "it", "its", "they", "them", "their",
    "what", "which", "who", "whom", "when", "where", "why", "how",
];

/// Header substring -> canonical section key.
const SECTION_SYNONYMS: &[(&str, &str)] = &[
    ("problem", "problem"),
    ("solution", "solution"),
    ("how to use", "how_to_use"),
    ("trade-off", "trade_offs"),
];

/// Sections whose tokens feed the content similarity signal.
const CONTENT_SECTIONS: &[&str] = &["problem", "solution"];

/// Categories used across the pattern library; anything else gets a warning
/// at load time but still participates in comparisons.
const KNOWN_CATEGORIES: &[&str] = &[
    "Orchestration & Control",
    "Context & Memory",
    "Feedback Loops",
    "Learning & Adaptation",
    "Reliability & Eval",
    "Security & Safety",
    "Tool Use & Environment",
    "UX & Collaboration",
    "Uncategorized",
];

// Document model

/// YAML front matter of a pattern file. Unknown keys (status, authors, ...)
/// are ignored; a file without a parsable title is excluded from the corpus.
#[derive(Deserialize, Debug)]
struct FrontMatter {
    title: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    category: String,
}

/// One corpus entry, validated and normalized at load time.
#[derive(Debug, Clone)]
struct Document {
    file: String,
    title: String,
    tags: TokenSet,
    category: String,
    sections: HashMap<&'static str, String>,
}

impl Document {
    /// Union of the tokenized problem and solution sections. Absent sections
    /// contribute nothing.
    fn content_tokens(&self) -> TokenSet {
        let mut tokens = TokenSet::default();
        for section in CONTENT_SECTIONS {
            if let Some(text) = self.sections.get(section) {
                tokens.extend(tokenize(text));
            }
        }
        tokens
    }
}

/// The full collection under comparison, sorted by file name for a
/// deterministic pair order. Read-only once built.
struct Corpus {
    docs: Vec<Document>,
}

#[derive(Serialize, Debug, Clone, Copy)]
struct SimilarityScore {
    tag: f64,
    title: f64,
    category: f64,
    content: f64,
    total: f64,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
enum Action {
    Merge,
    Review,
    Check,
    Related,
    Ok,
}

impl Action {
    /// Ordinal bands on the total score, evaluated top-down, first match wins.
    fn classify(total: f64, bands: &ActionBands) -> Action {
        if total >= bands.merge {
            Action::Merge
        } else if total >= bands.review {
            Action::Review
        } else if total >= bands.check {
            Action::Check
        } else if total >= bands.related {
            Action::Related
        } else {
            Action::Ok
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Action::Merge => "MERGE - Patterns are very similar, consider merging",
            Action::Review => "REVIEW - High similarity, manual review needed",
            Action::Check => "CHECK - Moderate similarity, check if related",
            Action::Related => "RELATED - May be related patterns",
            Action::Ok => "OK - Below similarity threshold",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::Merge => "MERGE",
            Action::Review => "REVIEW",
            Action::Check => "CHECK",
            Action::Related => "RELATED",
            Action::Ok => "OK",
        };
        write!(f, "{}", label)
    }
}

/// One flagged pair. Created fresh per run, never mutated.
#[derive(Serialize, Debug, Clone)]
struct ComparisonResult {
    file1: String,
    title1: String,
    file2: String,
    title2: String,
    similarity: SimilarityScore,
    action: Action,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { file, threshold, json, export, patterns_dir } => {
            cmd_check(&file, threshold, json, export.as_deref(), &patterns_dir, &cli.config, cli.quiet)
        }
        Commands::All { threshold, json, export, patterns_dir } => {
            cmd_all(threshold, json, export.as_deref(), &patterns_dir, &cli.config, cli.quiet)
        }
        Commands::Diff { file1, file2 } => {
            cmd_diff(&file1, &file2, &cli.config)
        }
    };

    match result {
        Ok(found) => {
            if found {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn cmd_check(
    file: &Path,
    threshold: f64,
    json: bool,
    export: Option<&Path>,
    patterns_dir: &Path,
    config_path: &Path,
    quiet: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    validate_threshold(threshold)?;

    let corpus = load_corpus(patterns_dir, quiet)?;
    let candidate = load_document(file)?;

    if !quiet {
        println!(
            "\n{} '{}' against existing patterns (threshold: {})",
            "Comparing".cyan().bold(),
            candidate.file.cyan(),
            threshold
        );
    }

    let results = compare_one(&candidate, &corpus, &config, threshold);

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_report(&results, threshold, &config.actions, true);
    }

    if let Some(path) = export {
        export_report(&results, path)?;
        if !quiet {
            println!("{} {}", "Report exported to".green(), path.display().to_string().cyan());
        }
    }

    Ok(!results.is_empty())
}

fn cmd_all(
    threshold: f64,
    json: bool,
    export: Option<&Path>,
    patterns_dir: &Path,
    config_path: &Path,
    quiet: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    validate_threshold(threshold)?;

    let corpus = load_corpus(patterns_dir, quiet)?;

    if !quiet {
        println!(
            "\n{} all patterns for similarities (threshold: {})",
            "Checking".cyan().bold(),
            threshold
        );
    }

    let results = compare_all(&corpus, &config, threshold);

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_report(&results, threshold, &config.actions, false);
    }

    if let Some(path) = export {
        export_report(&results, path)?;
        if !quiet {
            println!("{} {}", "Report exported to".green(), path.display().to_string().cyan());
        }
    }

    Ok(!results.is_empty())
}

/// Full breakdown for one pair, including the exploratory cosine score that
/// the weighted total does not consume.
fn cmd_diff(
    file1: &Path,
    file2: &Path,
    config_path: &Path,
) -> Result<bool, Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let doc1 = load_document(file1)?;
    let doc2 = load_document(file2)?;

    let similarity = score_pair(&doc1, &doc2, &config.weights);
    let action = Action::classify(similarity.total, &config.actions);

    let content1 = doc1.content_tokens();
    let content2 = doc2.content_tokens();
    let cosine = cosine_similarity(&content1, &content2);

    println!("{}", "Comparison".green().bold());
    println!();
    println!("  File 1: {} ({})", doc1.file.cyan(), doc1.title);
    println!("  File 2: {} ({})", doc2.file.cyan(), doc2.title);
    println!();
    println!("{}", "Similarity Scores".green().bold());
    println!();
    println!("  Total:     {:.2}", similarity.total);
    println!("  Tags:      {:.2} (Jaccard)", similarity.tag);
    println!("  Title:     {:.2} (edit distance)", similarity.title);
    println!("  Category:  {:.2}", similarity.category);
    println!("  Content:   {:.2} (Jaccard, problem + solution)", similarity.content);
    println!("  Cosine:    {:.2} (binary, content tokens)", cosine);
    println!();
    println!("  Suggested Action: {}", action.describe());

    let mut shared_tags: Vec<String> = doc1.tags.intersection(&doc2.tags).cloned().collect();
    shared_tags.sort();
    let mut only_in_1: Vec<String> = doc1.tags.difference(&doc2.tags).cloned().collect();
    only_in_1.sort();
    let mut only_in_2: Vec<String> = doc2.tags.difference(&doc1.tags).cloned().collect();
    only_in_2.sort();

    println!();
    println!("{} ({} tags)", "Shared Tags".green().bold(), shared_tags.len());
    print_token_list(&shared_tags, 24);

    println!();
    println!("{} ({} tags)", format!("Only in {}", doc1.file).yellow().bold(), only_in_1.len());
    print_token_list(&only_in_1, 24);

    println!();
    println!("{} ({} tags)", format!("Only in {}", doc2.file).yellow().bold(), only_in_2.len());
    print_token_list(&only_in_2, 24);

    let mut shared_content: Vec<String> = content1.intersection(&content2).cloned().collect();
    shared_content.sort();

    println!();
    println!(
        "{} ({} tokens)",
        "Shared Content Tokens".green().bold(),
        shared_content.len()
    );
    print_token_list(&shared_content, 24);

    Ok(false)
}

// Reporting

fn print_report(results: &[ComparisonResult], threshold: f64, bands: &ActionBands, single: bool) {
    if results.is_empty() {
        println!(
            "\n{}",
            format!("No patterns found with similarity >= {}", threshold).green()
        );
        return;
    }

    println!();
    println!("{}", "=".repeat(70));
    println!(
        "{} {} potential duplicate/related pattern pairs",
        "Found".yellow().bold(),
        results.len().to_string().yellow().bold()
    );
    println!("{}", "=".repeat(70));

    for (i, result) in results.iter().enumerate() {
        println!();
        if single {
            println!("{}. {}", i + 1, result.title2.cyan());
            println!("   File: {}", result.file2);
        } else {
            println!("{}. {} <-> {}", i + 1, result.title1.cyan(), result.title2.cyan());
            println!("   Files: {} <-> {}", result.file1, result.file2);
        }

        let sim = &result.similarity;
        println!("   Total Similarity:   {:.2}", sim.total);
        println!("   Tag Similarity:     {:.2} (Jaccard)", sim.tag);
        println!("   Title Similarity:   {:.2}", sim.title);
        println!("   Category Match:     {:.2}", sim.category);
        println!("   Content Similarity: {:.2}", sim.content);
        println!("   Suggested Action:   {}", result.action.describe());
    }

    let high = results
        .iter()
        .filter(|r| r.similarity.total >= bands.review)
        .count();
    if high > 0 {
        println!();
        println!("{}", "=".repeat(70));
        println!(
            "{} {} pairs with similarity >= {}",
            "warning:".yellow().bold(),
            high,
            bands.review
        );
        println!("   These may be duplicates or variants that need merging.");
        println!("{}", "=".repeat(70));
    }
}

fn export_report(results: &[ComparisonResult], output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines: Vec<String> = vec![
        "# Pattern Similarity Report".to_string(),
        String::new(),
        format!("Generated: {}", unix_timestamp()),
        format!("Total pairs found: {}", results.len()),
        String::new(),
        "---".to_string(),
        String::new(),
    ];

    for (i, result) in results.iter().enumerate() {
        let sim = &result.similarity;
        lines.extend([
            format!("## {}. {} <-> {}", i + 1, result.title1, result.title2),
            String::new(),
            format!("**Files:** `{}` <-> `{}`  ", result.file1, result.file2),
            format!("**Similarity:** {:.2}  ", sim.total),
            String::new(),
            "**Breakdown:**".to_string(),
            format!("- Tag Similarity: {:.2}", sim.tag),
            format!("- Title Similarity: {:.2}", sim.title),
            format!("- Category Match: {:.2}", sim.category),
            format!("- Content Similarity: {:.2}", sim.content),
            String::new(),
            format!("**Suggested Action:** {}", result.action.describe()),
            String::new(),
            "---".to_string(),
            String::new(),
        ]);
    }

    fs::write(output, lines.join("\n"))?;
    Ok(())
}

fn print_token_list(tokens: &[String], limit: usize) {
    for chunk in tokens[..tokens.len().min(limit)].chunks(8) {
        println!("  {}", chunk.join(", "));
    }
    if tokens.len() > limit {
        println!("  ... and {} more", tokens.len() - limit);
    }
}

// Corpus loading

fn load_corpus(patterns_dir: &Path, quiet: bool) -> Result<Corpus, Box<dyn std::error::Error>> {
    if !patterns_dir.is_dir() {
        return Err(format!("patterns directory not found: {}", patterns_dir.display()).into());
    }

    let mut docs = Vec::new();

    // Flat directory of pattern files; identifiers are file names, so not
    // recursing keeps them unique.
    let walker = WalkBuilder::new(patterns_dir)
        .hidden(true)
        .git_ignore(true)
        .max_depth(Some(1))
        .build();

    for entry in walker.filter_map(|e| e.ok()) {
        let path = entry.path();

        if path.is_dir() {
            continue;
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if ext != "md" {
            continue;
        }

        if path.file_name().and_then(|n| n.to_str()) == Some("TEMPLATE.md") {
            continue;
        }

        match load_document(path) {
            Ok(doc) => {
                if !doc.category.is_empty() && !KNOWN_CATEGORIES.contains(&doc.category.as_str()) {
                    warn(&format!("{}: unknown category '{}'", doc.file, doc.category));
                }
                docs.push(doc);
            }
            Err(e) => warn(&format!("could not load {}", e)),
        }
    }

    // Deterministic order: all-pairs iteration and tie-breaking depend on it.
    docs.sort_by(|a, b| a.file.cmp(&b.file));

    if !quiet {
        println!(
            "{} {} patterns for comparison",
            "Loaded".cyan().bold(),
            docs.len().to_string().cyan()
        );
    }

    Ok(Corpus { docs })
}

fn load_document(path: &Path) -> Result<Document, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let file = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    parse_document(&file, &content).map_err(|e| format!("{}: {}", path.display(), e).into())
}

fn parse_document(file: &str, content: &str) -> Result<Document, String> {
    let (yaml, body) =
        split_front_matter(content).ok_or_else(|| "missing front matter block".to_string())?;
    let meta: FrontMatter =
        serde_yaml::from_str(yaml).map_err(|e| format!("invalid front matter: {}", e))?;

    Ok(Document {
        file: file.to_string(),
        title: meta.title,
        tags: meta.tags.iter().map(|t| t.trim().to_lowercase()).collect(),
        category: meta.category,
        sections: extract_sections(body),
    })
}

/// Split `---`-delimited YAML front matter from the body. Returns None when
/// the block is missing or unterminated.
fn split_front_matter(content: &str) -> Option<(&str, &str)> {
    if !content.starts_with("---") {
        return None;
    }
    let tail = content.get(4..)?;
    let end = tail.find("\n---")? + 4;
    let yaml = &content[4..end];
    let body = &content[end + 4..];
    Some((yaml, body))
}

/// Extract canonical sections from a document body (front matter removed).
///
/// A `## ` header closes the previous section and opens a new one; headers
/// matching no synonym open an anonymous region whose content is discarded.
/// Fenced code blocks are skipped entirely, markers included. Fences do not
/// nest in this format, so a single open/close toggle suffices.
fn extract_sections(body: &str) -> HashMap<&'static str, String> {
    let mut sections = HashMap::new();
    let mut current: Option<&'static str> = None;
    let mut buf: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in body.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        if let Some(header) = line.strip_prefix("## ") {
            if let Some(key) = current {
                sections.insert(key, buf.join(" "));
            }
            current = canonical_section(header);
            buf.clear();
        } else if current.is_some() && !trimmed.is_empty() {
            buf.push(trimmed);
        }
    }

    if let Some(key) = current {
        sections.insert(key, buf.join(" "));
    }

    sections
}

fn canonical_section(header: &str) -> Option<&'static str> {
    let lower = header.trim().to_lowercase();
    SECTION_SYNONYMS
        .iter()
        .find(|(needle, _)| lower.contains(*needle))
        .map(|&(_, key)| key)
}

// Tokenization

fn word_regex() -> &'static Regex {
    static WORD_RE: OnceLock<Regex> = OnceLock::new();
    WORD_RE.get_or_init(|| Regex::new(r"[a-zA-Z0-9]+").unwrap())
}

fn stop_words() -> &'static HashSet<&'static str, ahash::RandomState> {
    static STOP: OnceLock<HashSet<&'static str, ahash::RandomState>> = OnceLock::new();
    STOP.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Lowercase word tokens longer than 3 characters, stop words removed.
/// Non-alphanumeric characters are word boundaries. Pure and total: any
/// string is valid input and yields a (possibly empty) set.
fn tokenize(text: &str) -> TokenSet {
    word_regex()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| w.len() > 3 && !stop_words().contains(w.as_str()))
        .collect()
}

// Similarity metrics. All three are symmetric and total; degenerate inputs
// map to explicit boundary values instead of errors.

/// J(A, B) = |A intersect B| / |A union B|, 0.0 when either set is empty.
fn jaccard_similarity(a: &TokenSet, b: &TokenSet) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Cosine over binary membership vectors: |A intersect B| / (sqrt|A| * sqrt|B|).
fn cosine_similarity(a: &TokenSet, b: &TokenSet) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let magnitude = (a.len() as f64).sqrt() * (b.len() as f64).sqrt();
    intersection / magnitude
}

/// Classic insert/delete/substitute Levenshtein distance. Two rows over the
/// shorter string keep space at O(min(m, n)).
fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let (outer, inner) = if a.len() >= b.len() { (&a, &b) } else { (&b, &a) };
    let mut prev: Vec<usize> = (0..=inner.len()).collect();
    let mut curr: Vec<usize> = vec![0; inner.len() + 1];

    for (i, &oc) in outer.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &ic) in inner.iter().enumerate() {
            let substitution = prev[j] + usize::from(oc != ic);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[inner.len()]
}

/// Normalized, case-insensitive string similarity: 1 - distance / max_len.
/// 1.0 when both strings are empty, 0.0 when exactly one is.
fn string_similarity(s1: &str, s2: &str) -> f64 {
    let a = s1.to_lowercase();
    let b = s2.to_lowercase();

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let max_len = a.chars().count().max(b.chars().count());
    let distance = levenshtein_distance(&a, &b);
    1.0 - (distance as f64 / max_len as f64)
}

// Aggregation and pairwise comparison

/// Detailed similarity between two documents. Pure function of its inputs.
fn score_pair(a: &Document, b: &Document, weights: &Weights) -> SimilarityScore {
    let tag = jaccard_similarity(&a.tags, &b.tags);
    let title = string_similarity(&a.title, &b.title);
    let category = if a.category == b.category { 1.0 } else { 0.0 };
    let content = jaccard_similarity(&a.content_tokens(), &b.content_tokens());

    let total = weights.tag * tag
        + weights.title * title
        + weights.category * category
        + weights.content * content;

    SimilarityScore {
        tag,
        title,
        category,
        content,
        total,
    }
}

/// Compare one candidate against the corpus, excluding any entry with the
/// candidate's own file name. Results with total >= threshold, sorted by
/// total descending; the stable sort keeps corpus order on ties.
fn compare_one(
    candidate: &Document,
    corpus: &Corpus,
    config: &SimilarityConfig,
    threshold: f64,
) -> Vec<ComparisonResult> {
    let mut results = Vec::new();

    for doc in &corpus.docs {
        if doc.file == candidate.file {
            continue;
        }

        let similarity = score_pair(candidate, doc, &config.weights);
        if similarity.total >= threshold {
            results.push(ComparisonResult {
                file1: candidate.file.clone(),
                title1: candidate.title.clone(),
                file2: doc.file.clone(),
                title2: doc.title.clone(),
                similarity,
                action: Action::classify(similarity.total, &config.actions),
            });
        }
    }

    results.sort_by(|a, b| {
        b.similarity
            .total
            .partial_cmp(&a.similarity.total)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results
}

/// Compare every unordered corpus pair exactly once (i < j over the fixed
/// corpus order). Same filtering and sort contract as compare_one.
fn compare_all(corpus: &Corpus, config: &SimilarityConfig, threshold: f64) -> Vec<ComparisonResult> {
    let mut results = Vec::new();

    for i in 0..corpus.docs.len() {
        for j in (i + 1)..corpus.docs.len() {
            let doc1 = &corpus.docs[i];
            let doc2 = &corpus.docs[j];

            let similarity = score_pair(doc1, doc2, &config.weights);
            if similarity.total >= threshold {
                results.push(ComparisonResult {
                    file1: doc1.file.clone(),
                    title1: doc1.title.clone(),
                    file2: doc2.file.clone(),
                    title2: doc2.title.clone(),
                    similarity,
                    action: Action::classify(similarity.total, &config.actions),
                });
            }
        }
    }

    results.sort_by(|a, b| {
        b.similarity
            .total
            .partial_cmp(&a.similarity.total)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results
}

// Helper functions

fn validate_threshold(threshold: f64) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(format!("threshold must be in [0, 1], got {}", threshold).into());
    }
    Ok(())
}

fn warn(msg: &str) {
    eprintln!("{}: {}", "warning".yellow().bold(), msg);
}

fn unix_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", duration.as_secs())
}
