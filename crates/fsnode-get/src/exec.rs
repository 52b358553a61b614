//! Request execution: local attempt, then container traversal.

use crate::metrics::GetMetrics;
use crate::remote::RemoteRequest;
use crate::service::GetService;
use crate::traverser::NodeAddress;
use crate::writer::ObjectWriter;
use fsnode_common::{Address, Error, Object, ObjectId, Range, Result, SplitInfo};
use futures::future::BoxFuture;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What the caller asked for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Kind {
    Get,
    Head,
    Range(Range),
}

impl Kind {
    pub(crate) const fn head_only(self) -> bool {
        matches!(self, Self::Head)
    }

    pub(crate) const fn range(self) -> Option<Range> {
        match self {
            Self::Range(range) => Some(range),
            _ => None,
        }
    }
}

/// One resolved request; child fetches derive their own from it
#[derive(Clone, Debug)]
pub(crate) struct Request {
    pub address: Address,
    pub raw: bool,
    pub local: bool,
    pub epoch: u64,
    pub kind: Kind,
    pub cancel: CancellationToken,
}

impl Request {
    /// Non-raw request for another object of the same container
    pub(crate) fn child(&self, object_id: ObjectId, kind: Kind) -> Self {
        Self {
            address: Address::new(self.address.container_id, object_id),
            raw: false,
            kind,
            ..self.clone()
        }
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

/// Result of a single successful fetch
enum Fetched {
    Object(Object),
    Range(Vec<u8>),
}

/// How the container traversal ended
enum Remote {
    Found(Fetched),
    Virtual(SplitInfo),
}

/// Errors that end the request instead of moving on to other sources
const fn is_terminal(e: &Error) -> bool {
    matches!(
        e,
        Error::AlreadyRemoved(_)
            | Error::RangeOutOfBounds { .. }
            | Error::Cancelled
            | Error::MalformedChild { .. }
    )
}

/// Write a payload chunk, skipping empty ones
pub(crate) fn write_chunk(writer: &mut dyn ObjectWriter, data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    writer.write_chunk(data)
}

fn deliver(kind: Kind, fetched: Fetched, writer: &mut dyn ObjectWriter) -> Result<()> {
    match fetched {
        Fetched::Range(data) => write_chunk(writer, &data),
        Fetched::Object(obj) => {
            writer.write_header(&obj.cut_payload())?;
            if kind == Kind::Get {
                write_chunk(writer, obj.payload())?;
            }
            Ok(())
        }
    }
}

impl GetService {
    /// Run `request` to completion, streaming the result into `writer`.
    ///
    /// Boxed so that assembly can fetch chunks through this same pipeline.
    pub(crate) fn execute<'a>(
        &'a self,
        request: &'a Request,
        writer: &'a mut dyn ObjectWriter,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            request.check_cancelled()?;

            let split_info = match self.fetch_local(request) {
                Ok(fetched) => {
                    GetMetrics::inc(&self.metrics.local_hits);
                    return deliver(request.kind, fetched, writer);
                }
                Err(Error::SplitInfo(si)) => *si,
                // Only a local miss goes to the network; store failures surface as is
                Err(e) if request.local || !matches!(e, Error::ObjectNotFound(_)) => {
                    return Err(e);
                }
                Err(e) => {
                    debug!(address = %request.address, error = %e, "Local lookup failed");
                    match self.execute_on_container(request).await? {
                        Remote::Found(fetched) => {
                            GetMetrics::inc(&self.metrics.remote_hits);
                            return deliver(request.kind, fetched, writer);
                        }
                        Remote::Virtual(si) => si,
                    }
                }
            };

            if self.can_assemble(request) {
                self.assemble(request, split_info, writer).await
            } else {
                debug!(address = %request.address, "Object is virtual, not assembling");
                Err(Error::split_info(split_info))
            }
        })
    }

    fn can_assemble(&self, request: &Request) -> bool {
        self.config.assembly && !request.raw && !request.kind.head_only()
    }

    fn fetch_local(&self, request: &Request) -> Result<Fetched> {
        let address = &request.address;
        match request.kind {
            Kind::Get => self.local.get(address).map(Fetched::Object),
            Kind::Head => self.local.head(address, request.raw).map(Fetched::Object),
            Kind::Range(range) => self.local.get_range(address, &range).map(Fetched::Range),
        }
    }

    /// Ask candidate nodes epoch by epoch, newest first
    async fn execute_on_container(&self, request: &Request) -> Result<Remote> {
        for back in 0..=self.config.lookback_depth {
            let Some(epoch) = request.epoch.checked_sub(back) else {
                break;
            };
            let mut traverser = match self.traversers.generate(&request.address, epoch).await {
                Ok(traverser) => traverser,
                Err(e) => {
                    debug!(address = %request.address, epoch, error = %e, "No traverser");
                    continue;
                }
            };

            loop {
                let batch = traverser.next();
                if batch.is_empty() {
                    debug!(address = %request.address, epoch, "No more nodes at epoch");
                    break;
                }
                for node in &batch {
                    request.check_cancelled()?;
                    match self.process_node(request, node).await {
                        Ok(fetched) => return Ok(Remote::Found(fetched)),
                        Err(Error::SplitInfo(si)) => {
                            debug!(address = %request.address, %node, "Remote reports virtual object");
                            return Ok(Remote::Virtual(*si));
                        }
                        Err(e) if is_terminal(&e) => return Err(e),
                        Err(e) => {
                            debug!(address = %request.address, %node, error = %e, "Remote fetch failed");
                        }
                    }
                }
            }
        }
        Err(Error::ObjectNotFound(request.address))
    }

    async fn process_node(&self, request: &Request, node: &NodeAddress) -> Result<Fetched> {
        let remote = RemoteRequest {
            address: request.address,
            range: request.kind.range(),
            head_only: request.kind.head_only(),
            raw: request.raw,
        };
        let limit = Duration::from_millis(self.config.remote_timeout_ms);
        let obj = tokio::select! {
            () = request.cancel.cancelled() => return Err(Error::Cancelled),
            res = tokio::time::timeout(limit, self.client.get(node, &remote)) => {
                res.map_err(|_| Error::Timeout)??
            }
        };

        match request.kind {
            Kind::Range(range) => {
                let data = obj.payload.unwrap_or_default();
                if data.len() as u64 != range.length {
                    return Err(Error::remote(
                        node,
                        format!("answered {} bytes for range {range}", data.len()),
                    ));
                }
                Ok(Fetched::Range(data))
            }
            Kind::Get | Kind::Head => {
                if obj.object_id != request.address.object_id {
                    return Err(Error::remote(node, format!("answered object {}", obj.object_id)));
                }
                Ok(Fetched::Object(obj))
            }
        }
    }
}
