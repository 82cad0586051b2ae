//! # Feature: Converter Registry
//!
//! Resolves conversions between type tags, either through one registered
//! converter or through a synthesized chain found by breadth-first search.
//!
//! Registration order is load-bearing: direct lookups and chain searches scan
//! converters in the order they were registered and the first match wins.
//! Register more specific converters before general ones.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Chain results cached per type pair, invalidated on mutation
//! - 1.0.0: Direct lookup and shortest-chain search

use dashmap::DashMap;
use log::debug;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{AnyEnum, AnyNumber, Converter, ConverterChain, Numeric, OptionEnum, TypeTag};
use crate::error::CommandError;
use crate::text::{Text, Translator};

type Parents = HashMap<TypeTag, Vec<TypeTag>>;

pub struct ConverterRegistry {
    converters: RwLock<Vec<Arc<Converter>>>,
    parents: RwLock<Parents>,
    chains: DashMap<(TypeTag, TypeTag), Option<Arc<ConverterChain>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl ConverterRegistry {
    /// An empty registry knowing only that primitive numbers are [`AnyNumber`]s.
    pub fn new() -> Self {
        let registry = ConverterRegistry {
            converters: RwLock::new(Vec::new()),
            parents: RwLock::new(HashMap::new()),
            chains: DashMap::new(),
        };
        let number = TypeTag::of::<AnyNumber>();
        for tag in [
            TypeTag::of::<i64>(),
            TypeTag::of::<i32>(),
            TypeTag::of::<i16>(),
            TypeTag::of::<i8>(),
            TypeTag::of::<f64>(),
            TypeTag::of::<f32>(),
        ] {
            registry.declare_subtype(tag, number);
        }
        registry
    }

    /// A registry holding every built-in converter.
    pub fn with_defaults(translator: Arc<dyn Translator>) -> anyhow::Result<Self> {
        let registry = Self::new();
        super::builtin::register_defaults(&registry, translator)?;
        Ok(registry)
    }

    /// Appends a converter. Duplicate type pairs are allowed; earlier registrations win.
    pub fn register(&self, converter: Converter) -> Arc<Converter> {
        let converter = Arc::new(converter);
        let mut converters = write(&self.converters);
        converters.push(converter.clone());
        self.chains.clear();
        debug!(
            "Registered converter {} -> {}",
            converter.input(),
            converter.output()
        );
        converter
    }

    /// Declares `sub` assignable to `sup`. Transitive through further declarations.
    pub fn declare_subtype(&self, sub: TypeTag, sup: TypeTag) {
        let mut parents = write(&self.parents);
        let entry = parents.entry(sub).or_default();
        if !entry.contains(&sup) {
            entry.push(sup);
        }
        self.chains.clear();
    }

    /// Registers ordinal and name converters for an option enum.
    pub fn register_enum<E: OptionEnum>(&self) {
        self.declare_subtype(TypeTag::of::<E>(), TypeTag::of::<AnyEnum>());
        self.register(Converter::numeric(|_, number: Numeric| {
            number
                .as_i64()
                .and_then(|ordinal| usize::try_from(ordinal).ok())
                .and_then(|ordinal| E::variants().get(ordinal))
                .cloned()
                .ok_or_else(|| CommandError::user(Text::library("exception.invalid_choice").arg(number)))
        }));
        self.register(Converter::new(|_, name: String| {
            let wanted = name.trim();
            E::variants()
                .iter()
                .find(|variant| variant.name().eq_ignore_ascii_case(wanted))
                .cloned()
                .ok_or_else(|| CommandError::user(Text::library("exception.invalid_choice").arg(wanted)))
        }));
    }

    pub fn len(&self) -> usize {
        read(&self.converters).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_assignable(&self, from: TypeTag, to: TypeTag) -> bool {
        assignable(&read(&self.parents), from, to)
    }

    /// Single converter from `input` to `output`: identity, then an exact pair,
    /// then the first converter accepting `input` and producing a subtype of `output`.
    pub fn direct_lookup(&self, input: TypeTag, output: TypeTag) -> Option<Arc<Converter>> {
        let converters = read(&self.converters);
        let parents = read(&self.parents);
        direct(&converters, &parents, input, output)
    }

    /// Shortest chain from `input` to `output`, or `None` when no path exists.
    pub fn find_chain(&self, input: TypeTag, output: TypeTag) -> Option<Arc<ConverterChain>> {
        if let Some(cached) = self.chains.get(&(input, output)) {
            return cached.value().clone();
        }

        // Both guards stay held until the result is cached, so a concurrent
        // register or declare_subtype clears the cache after this insert.
        let converters = read(&self.converters);
        let parents = read(&self.parents);
        let chain = search(&converters, &parents, input, output).map(Arc::new);
        match &chain {
            Some(found) => debug!(
                "Resolved {} -> {} in {} step(s)",
                input,
                output,
                found.len()
            ),
            None => debug!("No conversion path from {} to {}", input, output),
        }
        self.chains.insert((input, output), chain.clone());
        chain
    }

    #[cfg(test)]
    pub(crate) fn cached_pairs(&self) -> usize {
        self.chains.len()
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn assignable(parents: &Parents, from: TypeTag, to: TypeTag) -> bool {
    if from == to {
        return true;
    }
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([from]);
    while let Some(current) = queue.pop_front() {
        for parent in parents.get(&current).into_iter().flatten() {
            if *parent == to {
                return true;
            }
            if seen.insert(*parent) {
                queue.push_back(*parent);
            }
        }
    }
    false
}

fn direct(
    converters: &[Arc<Converter>],
    parents: &Parents,
    input: TypeTag,
    output: TypeTag,
) -> Option<Arc<Converter>> {
    if input == output {
        return Some(Arc::new(Converter::identity(input)));
    }
    converters
        .iter()
        .find(|converter| converter.input() == input && converter.output() == output)
        .or_else(|| {
            converters.iter().find(|converter| {
                assignable(parents, input, converter.input())
                    && assignable(parents, converter.output(), output)
            })
        })
        .cloned()
}

struct Node {
    converter: Arc<Converter>,
    parent: Option<usize>,
}

fn search(
    converters: &[Arc<Converter>],
    parents: &Parents,
    input: TypeTag,
    output: TypeTag,
) -> Option<ConverterChain> {
    if let Some(converter) = direct(converters, parents, input, output) {
        return Some(ConverterChain::single(converter, input, output));
    }

    let mut nodes: Vec<Node> = Vec::new();
    let mut encountered: HashSet<usize> = HashSet::new();
    let mut frontier: Vec<usize> = Vec::new();

    for (index, converter) in converters.iter().enumerate() {
        if !assignable(parents, input, converter.input()) || converter.output() == input {
            continue;
        }
        encountered.insert(index);
        if converter.can_convert_from() {
            nodes.push(Node {
                converter: converter.clone(),
                parent: None,
            });
            frontier.push(nodes.len() - 1);
        }
    }

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for &tail in &frontier {
            let tail_output = nodes[tail].converter.output();
            for (index, converter) in converters.iter().enumerate() {
                if !converter.can_convert_to()
                    || encountered.contains(&index)
                    || !assignable(parents, tail_output, converter.input())
                    || visits(&nodes, tail, input, converter.output())
                {
                    continue;
                }
                encountered.insert(index);
                nodes.push(Node {
                    converter: converter.clone(),
                    parent: Some(tail),
                });
                let head = nodes.len() - 1;
                if assignable(parents, converter.output(), output) {
                    return Some(assemble(&nodes, head, input, output));
                }
                if converter.can_convert_from() {
                    next.push(head);
                }
            }
        }
        frontier = next;
    }

    None
}

/// Whether `tag` already appears anywhere on the path ending at `node`.
fn visits(nodes: &[Node], node: usize, input: TypeTag, tag: TypeTag) -> bool {
    if tag == input {
        return true;
    }
    let mut current = Some(node);
    while let Some(index) = current {
        let converter = &nodes[index].converter;
        if converter.input() == tag || converter.output() == tag {
            return true;
        }
        current = nodes[index].parent;
    }
    false
}

fn assemble(nodes: &[Node], head: usize, input: TypeTag, output: TypeTag) -> ConverterChain {
    let mut steps = Vec::new();
    let mut current = Some(head);
    while let Some(index) = current {
        steps.push(nodes[index].converter.clone());
        current = nodes[index].parent;
    }
    steps.reverse();
    ConverterChain::new(input, output, steps)
}
