//! fsnode CLI - operate a storage shard on disk
//!
//! Opens the shard under the configured data directory and exposes the
//! metabase and retrieval engine operations. Other data directories can be
//! attached as peers, in which case retrieval falls back to them.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fsnode_common::{Address, Config, ContainerId, Object, ObjectType, OwnerId, Range, SplitId};
use fsnode_get::{
    FixedEpoch, GetPrm, GetService, NodeAddress, ObjectWriter, ShardClient,
    StaticTraverserGenerator,
};
use fsnode_meta_store::{Filter, MatchType, SearchFilters};
use fsnode_storage::Shard;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "fsnode-cli")]
#[command(about = "fsnode storage shard CLI")]
#[command(version)]
struct Args {
    /// Configuration file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory, overrides the configuration file
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log level, overrides the configuration file
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the retrieval commands
#[derive(clap::Args, Debug)]
struct FetchArgs {
    /// Object address as `<container>/<object>`
    address: Address,

    /// Report virtual objects instead of assembling them
    #[arg(long)]
    raw: bool,

    /// Do not query peers
    #[arg(long)]
    local: bool,

    /// Peer shard as `name=data_dir`, queried when the object is not local
    #[arg(long = "peer", value_parser = parse_key_val)]
    peers: Vec<(String, String)>,

    /// Placement epoch the request starts from
    #[arg(long, default_value = "1")]
    epoch: u64,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a file as an object and print its address
    Put {
        /// Container ID (hex)
        container: ContainerId,
        /// File holding the payload
        file: PathBuf,
        /// Owner ID (hex); random when omitted
        #[arg(long)]
        owner: Option<OwnerId>,
        /// Attribute as `key=value`
        #[arg(short, long = "attr", value_parser = parse_key_val)]
        attributes: Vec<(String, String)>,
        /// Split the payload into chunks of this many bytes
        #[arg(long)]
        split_size: Option<usize>,
    },
    /// Write the payload of an object to stdout or a file
    Get {
        #[command(flatten)]
        fetch: FetchArgs,
        /// Output file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print the header of an object as JSON
    Head {
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Write a payload range to stdout or a file
    Range {
        #[command(flatten)]
        fetch: FetchArgs,
        /// First byte of the range
        offset: u64,
        /// Number of bytes
        length: u64,
        /// Output file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// List objects of a container matching all filters
    Select {
        /// Container ID (hex)
        container: ContainerId,
        /// Filter as `key=value`, `key!=value`, `key^=prefix`, `key>n`,
        /// `key>=n`, `key<n`, `key<=n` or `!key`
        #[arg(short, long = "filter", value_parser = parse_filter)]
        filters: Vec<Filter>,
        /// Only objects that are not chunks of a larger one
        #[arg(long)]
        root: bool,
        /// Only physically stored objects
        #[arg(long)]
        phy: bool,
    },
    /// Remove objects and their payloads
    Delete {
        addresses: Vec<Address>,
    },
    /// Bury objects under a tombstone, or mark them for garbage collection
    Inhume {
        addresses: Vec<Address>,
        /// Tombstone address
        #[arg(long)]
        tombstone: Option<Address>,
    },
    /// List containers with stored objects
    Containers,
    /// Print the payload size accounted to a container
    Size {
        /// Container ID (hex)
        container: ContainerId,
    },
    /// List buried addresses
    Graveyard,
}

/// Streams payload chunks to a byte sink
struct StreamWriter {
    out: Box<dyn Write + Send>,
    header: Option<Object>,
}

impl StreamWriter {
    fn open(path: Option<&PathBuf>) -> Result<Self> {
        let out: Box<dyn Write + Send> = match path {
            Some(path) => Box::new(std::io::BufWriter::new(
                std::fs::File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?,
            )),
            None => Box::new(std::io::stdout()),
        };
        Ok(Self { out, header: None })
    }

    fn finish(mut self) -> Result<Option<Object>> {
        self.out.flush()?;
        Ok(self.header)
    }
}

impl ObjectWriter for StreamWriter {
    fn write_header(&mut self, header: &Object) -> fsnode_common::Result<()> {
        self.header = Some(header.cut_payload());
        Ok(())
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> fsnode_common::Result<()> {
        self.out.write_all(chunk)?;
        Ok(())
    }
}

/// Parse a `key=value` pair
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Parse a search filter expression.
fn parse_filter(s: &str) -> Result<Filter, String> {
    if let Some(key) = s.strip_prefix('!')
        && !key.contains(['=', '<', '>', '^'])
    {
        return Ok(Filter::new(key, MatchType::NotPresent, ""));
    }

    let pos = s
        .find(['=', '!', '^', '<', '>'])
        .ok_or_else(|| format!("no operator in filter '{s}'"))?;
    let (key, rest) = s.split_at(pos);
    if key.is_empty() {
        return Err(format!("empty key in filter '{s}'"));
    }
    let operators = [
        ("!=", MatchType::StringNotEqual),
        ("^=", MatchType::CommonPrefix),
        (">=", MatchType::NumGE),
        ("<=", MatchType::NumLE),
        ("=", MatchType::StringEqual),
        (">", MatchType::NumGT),
        ("<", MatchType::NumLT),
    ];
    operators
        .into_iter()
        .find_map(|(op, match_type)| {
            rest.strip_prefix(op)
                .map(|value| Filter::new(key, match_type, value))
        })
        .ok_or_else(|| format!("unknown operator in filter '{s}'"))
}

/// Objects to store for `payload`: a single object, or the chunks and link
/// of a split object. The address to report comes first.
fn build_objects(
    container: ContainerId,
    owner: OwnerId,
    payload: Vec<u8>,
    attributes: &[(String, String)],
    split_size: Option<usize>,
) -> (Address, Vec<Object>) {
    let mut parent = Object::new(container, owner, ObjectType::Regular);
    for (key, value) in attributes {
        parent = parent.with_attribute(key, value);
    }

    let split_size = match split_size {
        Some(size) if size > 0 && payload.len() > size => size,
        _ => {
            let obj = parent.with_payload(payload);
            return (obj.address(), vec![obj]);
        }
    };

    let parent = parent.with_payload(payload);
    let split_id = SplitId::new();
    let parts: Vec<&[u8]> = parent.payload().chunks(split_size).collect();
    let mut chunks: Vec<Object> = Vec::with_capacity(parts.len() + 1);
    for (i, part) in parts.iter().enumerate() {
        let mut chunk = Object::new(container, owner, ObjectType::Regular)
            .with_payload(part.to_vec())
            .with_split_id(split_id);
        if let Some(prev) = chunks.last() {
            chunk = chunk.with_previous(prev.object_id);
        }
        chunk = if i + 1 == parts.len() {
            chunk.with_parent(&parent)
        } else {
            chunk.with_parent_id(parent.object_id)
        };
        chunks.push(chunk);
    }
    let link = Object::new(container, owner, ObjectType::Regular)
        .with_split_id(split_id)
        .with_parent(&parent)
        .with_children(chunks.iter().map(|c| c.object_id).collect());
    chunks.push(link);
    (parent.address(), chunks)
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.node.data_dir.clone_from(dir);
    }
    if let Some(level) = &args.log_level {
        config.logging.level.clone_from(level);
    }
    Ok(config)
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Retrieval engine over the local shard, with `peers` as remote nodes
fn get_service(config: &Config, shard: Arc<Shard>, peers: &[(String, String)]) -> Result<GetService> {
    let mut client = ShardClient::new();
    for (name, dir) in peers {
        let mut peer_config = config.clone();
        peer_config.node.data_dir = PathBuf::from(dir);
        let peer = Shard::open(&peer_config).with_context(|| format!("Failed to open peer {name}"))?;
        client = client.with_node(NodeAddress::from(name.as_str()), Arc::new(peer));
    }
    let traversers = if peers.is_empty() {
        StaticTraverserGenerator::new()
    } else {
        StaticTraverserGenerator::uniform(client.nodes())
    };
    Ok(GetService::new(
        shard,
        Arc::new(traversers),
        Arc::new(client),
        Arc::new(FixedEpoch(1)),
        config.get.clone(),
    ))
}

fn prm(fetch: &FetchArgs) -> GetPrm {
    GetPrm::new(fetch.address)
        .with_raw(fetch.raw)
        .with_local(fetch.local)
        .with_epoch(fetch.epoch)
}

fn log_metrics(service: &GetService) -> Result<()> {
    let metrics = serde_json::to_string(&service.metrics().snapshot())?;
    debug!(%metrics, "Retrieval counters");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    let config = load_config(&args)?;

    init_logging(&config);

    let shard = Arc::new(Shard::open(&config).context("Failed to open shard")?);
    info!(node = %config.node.name, "Shard ready");

    match args.command {
        Commands::Put {
            container,
            file,
            owner,
            attributes,
            split_size,
        } => {
            let payload =
                std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let owner = owner.unwrap_or_else(|| OwnerId::new(rand::random()));
            let (address, objects) = build_objects(container, owner, payload, &attributes, split_size);
            for obj in &objects {
                shard.put(obj)?;
            }
            info!(%address, stored = objects.len(), "Object stored");
            println!("{address}");
        }
        Commands::Get { fetch, out } => {
            let service = get_service(&config, shard, &fetch.peers)?;
            let mut writer = StreamWriter::open(out.as_ref())?;
            service.get(&prm(&fetch), &mut writer).await?;
            if let Some(header) = writer.finish()? {
                info!(object = %header.object_id, size = header.payload_length(), "Object received");
            }
            log_metrics(&service)?;
        }
        Commands::Head { fetch } => {
            let service = get_service(&config, shard, &fetch.peers)?;
            let header = service.head(&prm(&fetch)).await?;
            println!("{}", serde_json::to_string_pretty(&header)?);
            log_metrics(&service)?;
        }
        Commands::Range {
            fetch,
            offset,
            length,
            out,
        } => {
            let service = get_service(&config, shard, &fetch.peers)?;
            let mut writer = StreamWriter::open(out.as_ref())?;
            service
                .get_range(&prm(&fetch), Range::new(offset, length), &mut writer)
                .await?;
            writer.finish()?;
            log_metrics(&service)?;
        }
        Commands::Select {
            container,
            filters,
            root,
            phy,
        } => {
            let mut search = SearchFilters::new();
            for filter in filters {
                search.add(filter);
            }
            if root {
                search.add(Filter::root());
            }
            if phy {
                search.add(Filter::phy());
            }
            for address in shard.select(&container, &search)? {
                println!("{address}");
            }
        }
        Commands::Delete { addresses } => {
            shard.delete(&addresses)?;
            println!("Deleted {} object(s)", addresses.len());
        }
        Commands::Inhume {
            addresses,
            tombstone,
        } => {
            shard.inhume(tombstone.as_ref(), &addresses)?;
            println!("Inhumed {} object(s)", addresses.len());
        }
        Commands::Containers => {
            for container in shard.containers()? {
                println!("{container}");
            }
        }
        Commands::Size { container } => {
            println!("{}", shard.container_size(&container)?);
        }
        Commands::Graveyard => {
            println!("{:<130} TOMBSTONE", "ADDRESS");
            for entry in shard.graveyard()? {
                let tombstone = match entry.tombstone {
                    Some(tombstone) => tombstone.to_string(),
                    None if entry.gc_mark => "(gc)".to_string(),
                    None => "-".to_string(),
                };
                println!("{:<130} {tombstone}", entry.address.to_string());
            }
        }
    }

    Ok(())
}
