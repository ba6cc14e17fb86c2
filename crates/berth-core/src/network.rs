//! IPv4 CIDR blocks and per-AZ subnet layout.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::TopologyError;

/// Narrowest VPC block accepted.
pub const MAX_VPC_PREFIX: u8 = 28;
/// Widest VPC block accepted.
pub const MIN_VPC_PREFIX: u8 = 16;
/// Narrowest subnet the layout may produce.
pub const MAX_SUBNET_PREFIX: u8 = 28;

/// An IPv4 network in CIDR notation. The address is always the network
/// address (host bits zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Cidr {
    addr: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, TopologyError> {
        if prefix > 32 {
            return Err(TopologyError::InvalidNetwork(format!(
                "prefix /{prefix} is out of range"
            )));
        }
        let bits = u32::from(addr);
        if bits & !mask(prefix) != 0 {
            return Err(TopologyError::InvalidNetwork(format!(
                "{addr}/{prefix} has host bits set"
            )));
        }
        Ok(Self { addr, prefix })
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Split into `count` equal blocks, rounding up to a power of two.
    ///
    /// Returns the first `count` blocks in address order.
    pub fn split(&self, count: usize) -> Result<Vec<Ipv4Cidr>, TopologyError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let extra = count.next_power_of_two().trailing_zeros() as u8;
        let prefix = self.prefix + extra;
        if prefix > MAX_SUBNET_PREFIX {
            return Err(TopologyError::InvalidNetwork(format!(
                "{self} is too small for {count} subnets"
            )));
        }
        let step = 1u32 << (32 - prefix);
        let base = u32::from(self.addr);
        Ok((0..count as u32)
            .map(|i| Ipv4Cidr {
                addr: Ipv4Addr::from(base + i * step),
                prefix,
            })
            .collect())
    }
}

fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| TopologyError::InvalidNetwork(format!("{s:?} is not in CIDR form")))?;
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| TopologyError::InvalidNetwork(format!("invalid address {addr:?}")))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| TopologyError::InvalidNetwork(format!("invalid prefix {prefix:?}")))?;
        Ipv4Cidr::new(addr, prefix)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}
