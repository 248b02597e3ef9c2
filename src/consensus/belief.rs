/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A peer's view of every peer's latest signed order.

use crate::cell::{Cell, Hash, Ref, SignedData};
use crate::collections::CellMap;
use crate::error::{CoreError, Result};
use crate::types::data_types::{AccountKey, Timestamp};

use super::order::Order;

/// Map from peer account key to the latest signed [`Order`] observed from that peer,
/// plus the merge timestamp. Beliefs are the unit of gossip: peers converge by merging
/// each other's beliefs.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Belief {
    pub(crate) orders: Ref,
    pub(crate) timestamp: Timestamp,
}

/// One decoded entry of the orders map.
#[derive(Clone, Debug)]
pub(crate) struct OrderEntry {
    pub(crate) key: AccountKey,
    pub(crate) signed: SignedData,
    pub(crate) order: Order,
}

impl Belief {
    pub fn create(orders: CellMap, timestamp: Timestamp) -> Belief {
        Belief { orders: Ref::of(Cell::Map(orders)), timestamp }
    }

    pub fn orders(&self) -> Result<CellMap> {
        Ok(self.orders.value()?.as_map()?.clone())
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn hash(&self) -> Hash {
        Cell::Belief(self.clone()).hash()
    }

    /// The order observed from `key`, if any.
    pub fn get_order(&self, key: &AccountKey) -> Result<Option<Order>> {
        match self.orders()?.get(&Cell::AccountKey(*key))? {
            Some(cell) => Ok(Some(cell.as_signed()?.value()?.as_order()?.clone())),
            None => Ok(None),
        }
    }

    /// Every entry of the orders map, decoded.
    pub(crate) fn order_entries(&self) -> Result<Vec<OrderEntry>> {
        let mut out = Vec::new();
        for entry in self.orders()?.entries()? {
            out.push(decode_entry(entry.key(), entry.value())?);
        }
        Ok(out)
    }

    /// Check every entry: the map key must match the signer, the signature must
    /// verify, and the order's own invariants must hold.
    pub fn validate(&self) -> Result<()> {
        for entry in self.order_entries()? {
            entry.signed.verify()?;
            entry.order.validate()?;
        }
        Ok(())
    }
}

/// Decode one orders-map entry, checking that the key cell matches the signer.
pub(crate) fn decode_entry(key: &Ref, value: &Ref) -> Result<OrderEntry> {
    let key = *key.value()?.as_account_key()?;
    let signed = value.value()?.as_signed()?.clone();
    if *signed.key() != key {
        return Err(CoreError::InvalidData("orders map key does not match signer"));
    }
    let order = signed.value()?.as_order()?.clone();
    Ok(OrderEntry { key, signed, order })
}
