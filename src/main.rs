use std::{
    collections::BTreeMap,
    env,
    error::Error,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use squall::{CrawlRecord, Crawler, Fetcher};

const DEFAULT_USER_AGENT: &str = "squall/0.1";
const DEFAULT_WORKERS: usize = 5;
const DEFAULT_MAX_DEPTH: usize = 2;
const DEFAULT_SEEDS: &[&str] = &[
    "https://www.rust-lang.org/",
    "https://blog.rust-lang.org/",
];

#[derive(Debug, Clone, Deserialize)]
struct Config {
    #[serde(default = "default_seeds")]
    seeds: Vec<String>,
    #[serde(default = "default_max_depth")]
    max_depth: usize,
    #[serde(default = "default_workers")]
    workers: usize,
    #[serde(default = "default_user_agent")]
    user_agent: String,
    #[serde(default)]
    output: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seeds: default_seeds(),
            max_depth: DEFAULT_MAX_DEPTH,
            workers: DEFAULT_WORKERS,
            user_agent: default_user_agent(),
            output: None,
        }
    }
}

fn default_seeds() -> Vec<String> {
    DEFAULT_SEEDS.iter().map(|s| s.to_string()).collect()
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn load_config() -> Result<Config, Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut seed_overrides: Vec<String> = Vec::new();
    let mut max_depth_override: Option<usize> = None;
    let mut workers_override: Option<usize> = None;
    let mut output_override: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                if let Some(path) = args.next() {
                    config_path = Some(PathBuf::from(path));
                }
            }
            "--seed" => {
                if let Some(url) = args.next() {
                    seed_overrides.push(url);
                }
            }
            "--max-depth" => {
                if let Some(val) = args.next() {
                    max_depth_override = val.parse::<usize>().ok();
                }
            }
            "--workers" => {
                if let Some(val) = args.next() {
                    workers_override = val.parse::<usize>().ok();
                }
            }
            "--output" => {
                if let Some(path) = args.next() {
                    output_override = Some(PathBuf::from(path));
                }
            }
            _ => {}
        }
    }

    let resolved_path = config_path.unwrap_or_else(|| PathBuf::from("config.yml"));
    let mut config = if resolved_path.exists() {
        let contents = fs::read_to_string(&resolved_path)?;
        serde_yaml::from_str::<Config>(&contents)?
    } else {
        Config::default()
    };

    if !seed_overrides.is_empty() {
        config.seeds = seed_overrides;
    }
    if let Some(max_depth) = max_depth_override {
        config.max_depth = max_depth;
    }
    if let Some(workers) = workers_override {
        config.workers = workers;
    }
    if let Some(output) = output_override {
        config.output = Some(output);
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let config = load_config()?;
    let fetcher = Arc::new(Fetcher::new(Some(vec![config.user_agent.clone()]))?);
    let crawler = Arc::new(Crawler::new(fetcher));

    {
        let crawler = crawler.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                info!("received ctrl+c; cancelling crawl");
                crawler.cancel();
            }
        });
    }

    let pages = crawler
        .run(&config.seeds, config.max_depth, config.workers)
        .await?;
    write_pages(config.output.as_deref(), &pages)?;

    let summary = crawler.stats().snapshot();
    info!(
        "summary: {} pages fetched, {} failed, {} duplicate skips, {} depth skips, {} links discovered, {} tasks cancelled in {}s",
        summary.fetched,
        summary.failed,
        summary.skipped_visited,
        summary.skipped_depth,
        summary.discovered,
        summary.cancelled,
        summary.duration_secs
    );

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn write_pages(
    output: Option<&Path>,
    pages: &BTreeMap<String, CrawlRecord>,
) -> Result<(), Box<dyn Error>> {
    let rendered = serde_json::to_string_pretty(pages)?;
    match output {
        Some(path) => {
            fs::write(path, rendered)?;
            info!("wrote {} pages to {}", pages.len(), path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: Config = serde_yaml::from_str("max_depth: 3\n").expect("valid yaml");
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert!(config.output.is_none());
        assert!(!config.seeds.is_empty());
    }

    #[test]
    fn config_accepts_full_yaml() {
        let yaml = r#"
seeds:
  - "https://a.test/"
max_depth: 1
workers: 2
user_agent: "custom/1.0"
output: "pages.json"
"#;
        let config: Config = serde_yaml::from_str(yaml).expect("valid yaml");
        assert_eq!(config.seeds, vec!["https://a.test/"]);
        assert_eq!(config.workers, 2);
        assert_eq!(config.output, Some(PathBuf::from("pages.json")));
    }

    #[test]
    fn write_pages_renders_json_to_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pages.json");
        let mut pages = BTreeMap::new();
        pages.insert(
            "https://a.test/".to_string(),
            CrawlRecord {
                url: "https://a.test/".to_string(),
                content: "<html></html>".to_string(),
                headers: vec!["Hello".to_string()],
            },
        );

        write_pages(Some(&path), &pages).expect("write should succeed");

        let written = fs::read_to_string(&path).expect("file exists");
        assert!(written.contains("https://a.test/"));
        assert!(written.contains("Hello"));
    }
}
