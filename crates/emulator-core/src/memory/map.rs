//! Sparse address-range map from bus addresses to device routes.

use std::collections::BTreeMap;

use tracing::debug;

use crate::api::{DeviceId, MmioRange};
use crate::fault::ConfigurationError;

/// Device that owns a claimed address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// The CPU register window.
    Registers,
    /// The program counter window.
    ProgramCounter,
    /// A registered peripheral.
    Peripheral(DeviceId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Claim {
    name: String,
    range: MmioRange,
    route: Route,
}

/// Non-overlapping device claims keyed by range start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceMap {
    claims: BTreeMap<u32, Claim>,
}

impl DeviceMap {
    /// Adds a claim. Zero-length claims are accepted and map nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::RangeWraps`] when the claim runs past the
    /// top of the address space, or [`ConfigurationError::OverlappingMapping`]
    /// naming the lowest address already owned by another device.
    pub fn insert(
        &mut self,
        name: &str,
        range: MmioRange,
        route: Route,
    ) -> Result<(), ConfigurationError> {
        if range.end() > u64::from(u32::MAX) + 1 {
            return Err(ConfigurationError::RangeWraps {
                name: name.to_owned(),
                start: range.start,
            });
        }
        if range.is_empty() {
            debug!(name, "device claims no addresses");
            return Ok(());
        }

        let preceding = self.claims.range(..=range.start).next_back();
        let following = self
            .claims
            .range(range.start..)
            .take_while(|(start, _)| u64::from(**start) < range.end());
        if let Some((address, owner)) = preceding
            .into_iter()
            .chain(following)
            .find_map(|(_, claim)| {
                claim
                    .range
                    .first_shared_address(range)
                    .map(|address| (address, claim))
            })
        {
            return Err(ConfigurationError::OverlappingMapping {
                address,
                requested: name.to_owned(),
                owner: owner.name.clone(),
            });
        }

        self.claims.insert(
            range.start,
            Claim {
                name: name.to_owned(),
                range,
                route,
            },
        );
        Ok(())
    }

    /// Resolves `address` to its owning route and the local offset within the claim.
    #[must_use]
    pub fn resolve(&self, address: u32) -> Option<(Route, u32)> {
        let (_, claim) = self.claims.range(..=address).next_back()?;
        claim
            .range
            .contains(address)
            .then(|| (claim.route, address - claim.range.start))
    }

    /// Number of non-empty claims.
    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// True when nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Iterates `(name, range, route)` in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, MmioRange, Route)> {
        self.claims
            .values()
            .map(|claim| (claim.name.as_str(), claim.range, claim.route))
    }
}
