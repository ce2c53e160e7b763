use clap::{Args, Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use uuid::Uuid;

use redirects::model::{Destination, NodeRef, RootNodeId, RuleDraft};

#[derive(Parser)]
#[command(name = "redirects-cli")]
#[command(about = "Management CLI for the redirect service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "admin-secret-key")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show index generation and rule counts
    Status,
    /// List redirect rules
    List {
        /// Only rules of this site root (0 = global rules)
        #[arg(long)]
        root: Option<i32>,
    },
    /// Show a single rule
    Get { id: Uuid },
    /// Create a redirect rule
    Add(AddArgs),
    /// Delete a redirect rule
    Remove { id: Uuid },
    /// Show where a request would be redirected
    Resolve {
        path: String,
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long)]
        host: Option<String>,
    },
    /// Force an index rebuild
    Rebuild,
}

#[derive(Args, Debug)]
struct AddArgs {
    /// Inbound path (or pattern with --pattern)
    path: String,

    /// Target URL; for --content/--media the last known node URL
    target: String,

    /// Target is a content node with this id
    #[arg(long, conflicts_with = "media")]
    content: Option<i32>,

    /// Target is a media node with this id
    #[arg(long)]
    media: Option<i32>,

    /// Restrict the rule to a site root
    #[arg(long)]
    root: Option<i32>,

    /// Query string the request must carry
    #[arg(long)]
    query: Option<String>,

    /// Treat the path as a regular expression
    #[arg(long)]
    pattern: bool,

    /// Answer with 302 instead of 301
    #[arg(long)]
    temporary: bool,

    /// Append the inbound query string to the target
    #[arg(long)]
    forward_query: bool,
}

impl AddArgs {
    fn to_draft(&self) -> RuleDraft {
        let destination = match (self.content, self.media) {
            (Some(id), _) => Destination::content(NodeRef::new(id, None), &self.target),
            (None, Some(id)) => Destination::media(NodeRef::new(id, None), &self.target),
            (None, None) => Destination::for_url(&self.target),
        };

        let mut draft = RuleDraft::new(&self.path, destination).permanent(!self.temporary);
        if let Some(root) = self.root.and_then(RootNodeId::from_raw) {
            draft = draft.root(root);
        }
        if let Some(query) = &self.query {
            draft = draft.query(query);
        }
        if self.pattern {
            draft = draft.pattern();
        }
        if self.forward_query {
            draft = draft.forward_query();
        }
        draft
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );
    let client = reqwest::Client::builder().default_headers(headers).build()?;
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", base)).send().await?,
        Commands::List { root } => {
            let mut req = client.get(format!("{}/admin/redirects", base));
            if let Some(root) = root {
                req = req.query(&[("root", root)]);
            }
            req.send().await?
        }
        Commands::Get { id } => {
            client
                .get(format!("{}/admin/redirects/{}", base, id))
                .send()
                .await?
        }
        Commands::Add(args) => {
            client
                .post(format!("{}/admin/redirects", base))
                .json(&args.to_draft())
                .send()
                .await?
        }
        Commands::Remove { id } => {
            client
                .delete(format!("{}/admin/redirects/{}", base, id))
                .send()
                .await?
        }
        Commands::Resolve { path, query, host } => {
            let mut params = vec![("path", path), ("query", query)];
            if let Some(host) = host {
                params.push(("host", host));
            }
            client
                .get(format!("{}/admin/resolve", base))
                .query(&params)
                .send()
                .await?
        }
        Commands::Rebuild => client.post(format!("{}/admin/rebuild", base)).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    if status == reqwest::StatusCode::NO_CONTENT {
        println!("OK");
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
