//! Binary search tree of the MMDB file.

use std::collections::VecDeque;

use super::format::{IpVersion, RecordSize, DATA_SECTION_SEPARATOR_SIZE, IPV4_SUBTREE_DEPTH};
use crate::address::Family;
use crate::cidr::CidrBlock;
use crate::error::SinkError;

/// IPv6 networks that embed an IPv4 address, as (network, prefix length).
pub const IPV4_ALIASES: [(u128, u8); 3] = [
    // ::ffff:0:0/96 (IPv4-mapped)
    (0xffff_0000_0000, 96),
    // 2001::/32 (Teredo, resolves the server address in bits 32..63)
    (0x2001_u128 << 112, 32),
    // 2002::/16 (6to4)
    (0x2002_u128 << 112, 16),
];

/// The alias network overlapping `network/prefix_len`, if any.
fn overlapping_alias(network: u128, prefix_len: u8) -> Option<(u128, u8)> {
    IPV4_ALIASES.into_iter().find(|&(alias, alias_len)| {
        let common = prefix_len.min(alias_len) as u32;
        common == 0 || (network ^ alias) >> (128 - common) == 0
    })
}

/// One side of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    /// No data for this subtree
    Empty,
    /// Index into the node arena
    Node(usize),
    /// Offset into the data section
    Data(u32),
}

#[derive(Debug, Clone)]
struct Node {
    children: [Record; 2],
}

/// In-memory search tree; insertion replaces whatever the block covered.
///
/// Nodes cut off by a replacing insert go to a free list and are reused.
#[derive(Debug, Clone)]
pub struct SearchTree {
    ip_version: IpVersion,
    nodes: Vec<Node>,
    free: Vec<usize>,
    reserve_aliases: bool,
}

impl SearchTree {
    pub fn new(ip_version: IpVersion) -> Self {
        Self {
            ip_version,
            nodes: vec![Node {
                children: [Record::Empty; 2],
            }],
            free: Vec::new(),
            reserve_aliases: false,
        }
    }

    /// A tree whose [`IPV4_ALIASES`] networks are kept free for
    /// [`alias_ipv4`](Self::alias_ipv4): IPv6 inserts overlapping them fail.
    pub fn with_ipv4_aliases(ip_version: IpVersion) -> Self {
        Self {
            reserve_aliases: ip_version == IpVersion::V6,
            ..Self::new(ip_version)
        }
    }

    pub fn ip_version(&self) -> IpVersion {
        self.ip_version
    }

    /// Point `block` at the data section offset `data`.
    pub fn insert(&mut self, block: &CidrBlock, data: u32) -> Result<(), SinkError> {
        let (key, prefix_len) = self.key_for(block)?;
        self.set(key, prefix_len, Record::Data(data));
        Ok(())
    }

    /// Map a block to its tree key and depth.
    fn key_for(&self, block: &CidrBlock) -> Result<(u128, u8), SinkError> {
        let value = block.network().value();
        match (self.ip_version, block.family()) {
            (IpVersion::V4, Family::V4) => Ok((value, block.prefix_len())),
            (IpVersion::V4, Family::V6) => Err(SinkError::Ipv6InIpv4Tree),
            (IpVersion::V6, Family::V4) => Ok((value, block.prefix_len() + IPV4_SUBTREE_DEPTH)),
            (IpVersion::V6, Family::V6) => {
                if self.reserve_aliases {
                    if let Some((alias, alias_len)) = overlapping_alias(value, block.prefix_len()) {
                        return Err(SinkError::AliasedNetwork {
                            network: block.to_string(),
                            alias: format!("{}/{}", std::net::Ipv6Addr::from(alias), alias_len),
                        });
                    }
                }
                Ok((value, block.prefix_len()))
            }
        }
    }

    fn bit(&self, key: u128, depth: u8) -> usize {
        let shift = self.ip_version.tree_depth() - 1 - depth;
        ((key >> shift) & 1) as usize
    }

    fn push_node(&mut self, children: [Record; 2]) -> usize {
        if let Some(idx) = self.free.pop() {
            self.nodes[idx].children = children;
            return idx;
        }
        self.nodes.push(Node { children });
        self.nodes.len() - 1
    }

    /// Put every node of the subtree under `record` on the free list.
    fn release(&mut self, record: Record) {
        let mut stack = match record {
            Record::Node(idx) => vec![idx],
            _ => return,
        };
        while let Some(idx) = stack.pop() {
            for child in self.nodes[idx].children {
                if let Record::Node(next) = child {
                    stack.push(next);
                }
            }
            self.nodes[idx].children = [Record::Empty; 2];
            self.free.push(idx);
        }
    }

    /// Store `record` for every address under `key/prefix_len`.
    ///
    /// Data or empty records met on the way down are split so that the
    /// sibling halves keep their previous value.
    fn set(&mut self, key: u128, prefix_len: u8, record: Record) {
        if prefix_len == 0 {
            let [left, right] = std::mem::replace(&mut self.nodes[0].children, [record; 2]);
            self.release(left);
            self.release(right);
            return;
        }

        let mut node = 0;
        for depth in 0..prefix_len - 1 {
            let bit = self.bit(key, depth);
            node = match self.nodes[node].children[bit] {
                Record::Node(next) => next,
                other => {
                    let next = self.push_node([other; 2]);
                    self.nodes[node].children[bit] = Record::Node(next);
                    next
                }
            };
        }
        let bit = self.bit(key, prefix_len - 1);
        let replaced = std::mem::replace(&mut self.nodes[node].children[bit], record);
        self.release(replaced);
    }

    /// Record covering `::/96`, i.e. the root of the IPv4 subtree.
    fn ipv4_root(&self) -> Record {
        let mut node = 0;
        for depth in 0..IPV4_SUBTREE_DEPTH {
            let record = self.nodes[node].children[0];
            match record {
                Record::Node(next) if depth + 1 < IPV4_SUBTREE_DEPTH => node = next,
                other => return other,
            }
        }
        Record::Empty
    }

    /// Make the IPv4-embedding IPv6 networks resolve through the IPv4 subtree.
    ///
    /// Must run after all inserts: aliased nodes are shared afterwards.
    /// Anything stored under an alias network is replaced, so trees built
    /// with [`with_ipv4_aliases`](Self::with_ipv4_aliases) keep them empty.
    pub fn alias_ipv4(&mut self) {
        if self.ip_version != IpVersion::V6 {
            return;
        }
        let target = self.ipv4_root();
        if target == Record::Empty {
            return;
        }
        for (network, prefix_len) in IPV4_ALIASES {
            self.set(network, prefix_len, target);
        }
    }

    /// Number of nodes reachable from the root.
    pub fn node_count(&self) -> usize {
        self.numbering().0.len()
    }

    /// Breadth-first order of reachable nodes and their assigned numbers.
    ///
    /// Shared (aliased) nodes are numbered once.
    fn numbering(&self) -> (Vec<usize>, Vec<Option<u32>>) {
        let mut numbers: Vec<Option<u32>> = vec![None; self.nodes.len()];
        let mut order = Vec::new();
        let mut queue = VecDeque::from([0usize]);
        numbers[0] = Some(0);

        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            for child in self.nodes[idx].children {
                if let Record::Node(next) = child {
                    if numbers[next].is_none() {
                        numbers[next] = Some((order.len() + queue.len()) as u32);
                        queue.push_back(next);
                    }
                }
            }
        }
        (order, numbers)
    }

    /// Serialize the tree; returns the bytes and the node count.
    pub fn serialize(&self, record_size: RecordSize) -> Result<(Vec<u8>, u32), SinkError> {
        let (order, numbers) = self.numbering();
        let node_count = order.len() as u64;
        let mut buf = Vec::with_capacity(order.len() * record_size.node_bytes());

        let resolve = |record: Record| -> Result<u32, SinkError> {
            let value = match record {
                Record::Empty => node_count,
                Record::Node(idx) => numbers[idx].map(u64::from).unwrap_or(node_count),
                Record::Data(offset) => {
                    node_count + DATA_SECTION_SEPARATOR_SIZE as u64 + offset as u64
                }
            };
            if value > record_size.max_value() {
                return Err(SinkError::RecordOverflow {
                    value,
                    record_size: record_size.bits(),
                });
            }
            Ok(value as u32)
        };

        for idx in &order {
            let [left, right] = self.nodes[*idx].children;
            record_size.write_node(&mut buf, resolve(left)?, resolve(right)?);
        }

        Ok((buf, node_count as u32))
    }
}
