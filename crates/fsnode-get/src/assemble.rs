//! Reassembly of virtual objects from their chunks.
//!
//! The entry chunk (link, else last part) carries the parent header. From
//! there the payload is streamed either by walking the link's children in
//! order, or by following `previous` pointers back from the last part and
//! replaying the chain forwards. For ranges only the chunks overlapping the
//! window are fetched, each with its own sub-range.

use crate::exec::{write_chunk, Kind, Request};
use crate::metrics::GetMetrics;
use crate::service::GetService;
use crate::writer::{ObjectWriter, SimpleObjectWriter};
use fsnode_common::{Address, Error, Object, ObjectId, Range, Result, SplitInfo};
use std::collections::HashSet;
use tracing::debug;

/// Chunks to stream, in payload order, with the part of each to take
type Chain = Vec<(ObjectId, Option<Range>)>;

/// State gathered from the entry chunk
struct Entry {
    parent: Object,
    /// Offset of the entry chunk inside the parent payload
    offset: u64,
    /// Payload of the entry chunk, cut to the requested window
    tail: Vec<u8>,
    previous: Option<ObjectId>,
    children: Vec<ObjectId>,
}

fn malformed(child: ObjectId, reason: impl Into<String>) -> Error {
    Error::MalformedChild {
        child,
        reason: reason.into(),
    }
}

/// Fail unless `child` names `target` as its parent (when it names one)
fn check_parent(target: &Address, child: &Object) -> Result<()> {
    match child.parent_id() {
        Some(parent_id) if parent_id != target.object_id => Err(malformed(
            child.object_id,
            format!("belongs to {parent_id}, not {}", target.object_id),
        )),
        _ => Ok(()),
    }
}

impl GetService {
    pub(crate) async fn assemble(
        &self,
        request: &Request,
        split_info: SplitInfo,
        writer: &mut dyn ObjectWriter,
    ) -> Result<()> {
        GetMetrics::inc(&self.metrics.assemblies);
        let Some(entry_id) = split_info.link.or(split_info.last_part) else {
            debug!(address = %request.address, "Split info names no chunk");
            return Err(Error::ObjectNotFound(request.address));
        };
        debug!(address = %request.address, entry = %entry_id, "Assembling virtual object");

        let range = request.kind.range();
        let entry = self.init_from_child(request, entry_id, range).await?;

        if let Some(&last) = entry.children.last() {
            match range {
                None => {
                    writer.write_header(&entry.parent)?;
                    for &child in &entry.children {
                        let payload = self.fetch_chunk(request, child, None).await?;
                        write_chunk(writer, &payload)?;
                    }
                }
                Some(_) => {
                    let chain = self
                        .build_chain_in_reverse(request, last, entry.offset, range)
                        .await?;
                    self.overtake(request, chain, writer).await?;
                    write_chunk(writer, &entry.tail)?;
                }
            }
        } else if let Some(previous) = entry.previous {
            if range.is_none() {
                writer.write_header(&entry.parent)?;
            }
            let chain = self
                .build_chain_in_reverse(request, previous, entry.offset, range)
                .await?;
            self.overtake(request, chain, writer).await?;
            write_chunk(writer, &entry.tail)?;
        } else {
            debug!(address = %request.address, entry = %entry_id, "Entry chunk has no siblings");
            return Err(Error::ObjectNotFound(request.address));
        }
        Ok(())
    }

    /// Fetch the entry chunk and read the parent header out of it
    async fn init_from_child(
        &self,
        request: &Request,
        entry_id: ObjectId,
        range: Option<Range>,
    ) -> Result<Entry> {
        let child_request = request.child(entry_id, Kind::Get);
        let mut sink = SimpleObjectWriter::new();
        self.execute(&child_request, &mut sink).await?;
        let child = sink
            .into_object()
            .ok_or_else(|| malformed(entry_id, "no header received"))?;

        let parent = child
            .parent()
            .ok_or_else(|| malformed(entry_id, "no parent header"))?;
        if parent.object_id != request.address.object_id {
            return Err(malformed(
                entry_id,
                format!("carries parent {}, not {}", parent.object_id, request.address.object_id),
            ));
        }
        let parent = parent.cut_payload();

        let parent_size = parent.payload_length();
        let child_size = child.payload_length();
        let offset = parent_size
            .checked_sub(child_size)
            .ok_or_else(|| malformed(entry_id, "larger than its parent"))?;

        let tail = match range {
            None => child.payload().to_vec(),
            Some(range) => {
                if !range.fits(parent_size) {
                    return Err(Error::RangeOutOfBounds {
                        offset: range.offset,
                        length: range.length,
                        size: parent_size,
                    });
                }
                range
                    .overlap(offset, child_size)
                    .and_then(|part| part.slice(child.payload()))
                    .map(<[u8]>::to_vec)
                    .unwrap_or_default()
            }
        };

        Ok(Entry {
            parent,
            offset,
            tail,
            previous: child.previous_id(),
            children: child.children().to_vec(),
        })
    }

    /// Walk `previous` pointers back from `start`, which ends at `offset`.
    ///
    /// With a range the walk stops once it passes the window start and only
    /// overlapping chunks are kept.
    async fn build_chain_in_reverse(
        &self,
        request: &Request,
        start: ObjectId,
        mut offset: u64,
        range: Option<Range>,
    ) -> Result<Chain> {
        let mut chain = Chain::new();
        let mut seen = HashSet::new();
        let mut prev = Some(start);

        while let Some(id) = prev {
            if let Some(range) = range
                && offset < range.offset
            {
                break;
            }
            if !seen.insert(id) {
                return Err(malformed(id, "split chain loops"));
            }

            let head = self.head_chunk(request, id).await?;
            match range {
                Some(range) => {
                    let size = head.payload_length();
                    offset = offset
                        .checked_sub(size)
                        .ok_or_else(|| malformed(id, "chunks exceed parent length"))?;
                    if let Some(part) = range.overlap(offset, size) {
                        chain.push((id, Some(part)));
                    }
                }
                None => chain.push((id, None)),
            }
            prev = head.previous_id();
        }

        chain.reverse();
        Ok(chain)
    }

    /// Stream `chain` into `writer` in order
    async fn overtake(&self, request: &Request, chain: Chain, writer: &mut dyn ObjectWriter) -> Result<()> {
        for (id, part) in chain {
            let payload = self.fetch_chunk(request, id, part).await?;
            write_chunk(writer, &payload)?;
        }
        Ok(())
    }

    async fn head_chunk(&self, request: &Request, id: ObjectId) -> Result<Object> {
        let child_request = request.child(id, Kind::Head);
        let mut sink = SimpleObjectWriter::new();
        self.execute(&child_request, &mut sink).await?;
        let head = sink
            .header()
            .cloned()
            .ok_or_else(|| malformed(id, "no header received"))?;
        check_parent(&request.address, &head)?;
        Ok(head)
    }

    /// Payload of chunk `id`, or only `part` of it
    async fn fetch_chunk(&self, request: &Request, id: ObjectId, part: Option<Range>) -> Result<Vec<u8>> {
        let Some(part) = part else {
            let child_request = request.child(id, Kind::Get);
            let mut sink = SimpleObjectWriter::new();
            self.execute(&child_request, &mut sink).await?;
            let child = sink
                .into_object()
                .ok_or_else(|| malformed(id, "no header received"))?;
            check_parent(&request.address, &child)?;
            return Ok(child.payload.unwrap_or_default());
        };

        let child_request = request.child(id, Kind::Range(part));
        let mut sink = SimpleObjectWriter::new();
        self.execute(&child_request, &mut sink).await?;
        Ok(sink.into_payload())
    }
}
