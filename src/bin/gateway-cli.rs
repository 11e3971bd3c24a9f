use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Query a running advisory-gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search advisories by CVE and/or affected repository
    Advisories {
        #[arg(long)]
        cve: Option<String>,
        /// Repository as owner/name
        #[arg(long)]
        repo: Option<String>,
    },
    /// Show one advisory by GHSA id
    Advisory { ghsa_id: String },
    /// Show a commit
    Commit { owner: String, repo: String, reference: String },
    /// Show a release by tag
    Release { owner: String, repo: String, tag: String },
    /// Show a pull request
    Pull { owner: String, repo: String, number: u64 },
    /// Check gateway health
    Health,
}

impl Commands {
    fn endpoint(&self) -> (&'static str, Vec<(&'static str, String)>) {
        match self {
            Commands::Advisories { cve, repo } => {
                let mut params = Vec::new();
                if let Some(cve) = cve {
                    params.push(("cve", cve.clone()));
                }
                if let Some(repo) = repo {
                    params.push(("repo", repo.clone()));
                }
                ("/advisories", params)
            }
            Commands::Advisory { ghsa_id } => {
                ("/advisory_details", vec![("ghsa_id", ghsa_id.clone())])
            }
            Commands::Commit { owner, repo, reference } => (
                "/commit",
                vec![("owner", owner.clone()), ("repo", repo.clone()), ("ref", reference.clone())],
            ),
            Commands::Release { owner, repo, tag } => (
                "/release",
                vec![("owner", owner.clone()), ("repo", repo.clone()), ("tag", tag.clone())],
            ),
            Commands::Pull { owner, repo, number } => (
                "/pull",
                vec![
                    ("owner", owner.clone()),
                    ("repo", repo.clone()),
                    ("pullNumber", number.to_string()),
                ],
            ),
            Commands::Health => ("/health", Vec::new()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let (path, params) = cli.command.endpoint();
    let res = client
        .get(format!("{}{}", cli.url.trim_end_matches('/'), path))
        .query(&params)
        .send()
        .await?;

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if let Some(retry_after) = res.headers().get("retry-after") {
        eprintln!("Retry-After: {}", retry_after.to_str().unwrap_or("?"));
    }

    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => {
            if !status.is_success() {
                eprintln!("Error: gateway returned status {}", status);
            }
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Err(_) => {
            eprintln!("Error: gateway returned status {} with non-JSON body", status);
            eprintln!("{}", text);
        }
    }
    Ok(())
}
