//! Graveyard: burying addresses and walking buried ones.

use crate::keys;
use crate::put::change_container_size;
use crate::store::{get_value, has_key, put_value, scan_prefix, Metabase, MetabaseResult};
use crate::tables::{GC_MARK, GRAVEYARD_PREFIX};
use fsnode_common::{Address, Object, ObjectType};
use tracing::debug;

/// One buried address
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraveyardEntry {
    pub address: Address,
    /// Tombstone that buried the address, if any
    pub tombstone: Option<Address>,
    /// Buried by the garbage collector rather than a tombstone
    pub gc_mark: bool,
}

impl Metabase {
    /// Bury `addresses` under `tombstone`, or mark them for garbage
    /// collection when no tombstone is given.
    ///
    /// Live regular objects stop counting towards their container size.
    pub fn inhume(&self, tombstone: Option<&Address>, addresses: &[Address]) -> MetabaseResult<()> {
        let value = tombstone.map_or_else(|| GC_MARK.to_vec(), |t| t.to_bytes().to_vec());
        self.write(|table| {
            for address in addresses {
                let grave = keys::graveyard(address);
                if !has_key(&*table, &grave)?
                    && let Some(data) = get_value(&*table, &keys::primary(address))?
                {
                    let obj: Object = bincode::deserialize(&data)?;
                    if obj.object_type() == ObjectType::Regular {
                        change_container_size(
                            table,
                            &address.container_id,
                            obj.payload_length(),
                            false,
                        )?;
                    }
                }
                put_value(table, &grave, &value)?;
            }
            Ok(())
        })?;
        debug!(
            count = addresses.len(),
            tombstone = ?tombstone.map(ToString::to_string),
            "Inhumed objects"
        );
        Ok(())
    }

    /// Visit every buried address; the visitor returns `true` to stop.
    pub fn iterate_graveyard<F>(&self, mut visit: F) -> MetabaseResult<()>
    where
        F: FnMut(GraveyardEntry) -> bool,
    {
        self.read(|table| {
            scan_prefix(table, &[GRAVEYARD_PREFIX], |key, value| {
                let address = keys::parse_address(key)?;
                let gc_mark = value == GC_MARK;
                let tombstone = if gc_mark {
                    None
                } else {
                    Address::from_slice(value).ok()
                };
                Ok(visit(GraveyardEntry {
                    address,
                    tombstone,
                    gc_mark,
                }))
            })
        })
    }

    /// All buried addresses
    pub fn graveyard(&self) -> MetabaseResult<Vec<GraveyardEntry>> {
        let mut entries = Vec::new();
        self.iterate_graveyard(|entry| {
            entries.push(entry);
            false
        })?;
        Ok(entries)
    }
}
