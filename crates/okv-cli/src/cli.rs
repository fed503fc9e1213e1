use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "okv",
    about = "OKV — uniform object storage with versioned appends",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Storage backend to operate against.
    #[arg(long, value_enum, global = true, default_value = "in-memory")]
    pub service: Service,

    /// API layer: raw storage, or the appender versioning protocol.
    #[arg(long, value_enum, global = true, default_value = "storage")]
    pub layer: Layer,

    /// Root directory for the flat-file backend.
    #[arg(long, global = true)]
    pub base_path: Option<PathBuf>,

    /// Gateway endpoint for the remote backend; derived from --region when
    /// omitted.
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Region for the remote backend.
    #[arg(long, global = true, default_value = "us-east-1")]
    pub region: String,

    /// Canned ACL for objects stored on the remote backend.
    #[arg(long, global = true, default_value = "private")]
    pub acl: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Service {
    InMemory,
    FlatFile,
    Remote,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Layer {
    Storage,
    Appender,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch one record and write its payload to stdout
    Get(GetArgs),
    /// Store a file as a record
    Put(PutArgs),
    /// Delete one record
    Delete(DeleteArgs),
    /// List live records in a namespace
    Scan(ScanArgs),
    /// Append a new version and repoint "default" at it (appender layer)
    Append(AppendArgs),
    /// Resolve and print the latest version of an id (appender layer)
    GetLatest(GetLatestArgs),
}

#[derive(Debug, Args)]
pub struct GetArgs {
    #[arg(long)]
    pub namespace: String,
    #[arg(long)]
    pub id: String,
    /// Version key; the reserved "default" slot when omitted.
    #[arg(long)]
    pub key: Option<String>,
}

#[derive(Debug, Args)]
pub struct PutArgs {
    #[arg(long)]
    pub namespace: String,
    #[arg(long)]
    pub id: String,
    #[arg(long)]
    pub key: Option<String>,
    /// File whose contents become the payload.
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Compress the payload with gzip.
    #[arg(long)]
    pub gzip: bool,
    /// Advisory MIME type.
    #[arg(long)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[arg(long)]
    pub namespace: String,
    #[arg(long)]
    pub id: String,
    #[arg(long)]
    pub key: Option<String>,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    #[arg(long)]
    pub namespace: String,
    /// Narrow to one object id.
    #[arg(long)]
    pub id: Option<String>,
    /// Narrow to one version key.
    #[arg(long)]
    pub key: Option<String>,
}

#[derive(Debug, Args)]
pub struct AppendArgs {
    #[arg(long)]
    pub namespace: String,
    #[arg(long)]
    pub id: String,
    /// Version key; a UTC timestamp is generated when omitted.
    #[arg(long)]
    pub key: Option<String>,
    /// File whose contents become the payload.
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Compress the payload with gzip.
    #[arg(long)]
    pub gzip: bool,
    /// Advisory MIME type.
    #[arg(long)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Args)]
pub struct GetLatestArgs {
    #[arg(long)]
    pub namespace: String,
    #[arg(long)]
    pub id: String,
}
