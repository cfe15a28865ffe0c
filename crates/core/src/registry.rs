//! Converter registry: discovery, indexing by format pair, and path search.

use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::ConvertersConfig;
use crate::converter::{Converter, ConverterFactory, IdentityConverter, ParameterSchema};
use crate::error::DiscoveryError;
use crate::format::{self, FormatId};

/// Source of converter factories, grouped by category.
pub trait ConverterProvider: Send + Sync {
    /// Category names this provider can load.
    fn categories(&self) -> Vec<String>;

    /// Load the converter factories of one category.
    fn load(&self, category: &str) -> Result<Vec<ConverterFactory>, DiscoveryError>;
}

/// Provider backed by an explicit list of factories.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    categories: Vec<(String, Vec<ConverterFactory>)>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a category, appending to it if it already exists.
    pub fn with_category(mut self, name: impl Into<String>, factories: Vec<ConverterFactory>) -> Self {
        let name = name.into();
        match self.categories.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => existing.extend(factories),
            None => self.categories.push((name, factories)),
        }
        self
    }
}

impl ConverterProvider for StaticProvider {
    fn categories(&self) -> Vec<String> {
        self.categories.iter().map(|(n, _)| n.clone()).collect()
    }

    fn load(&self, category: &str) -> Result<Vec<ConverterFactory>, DiscoveryError> {
        self.categories
            .iter()
            .find(|(n, _)| n == category)
            .map(|(_, factories)| factories.clone())
            .ok_or_else(|| DiscoveryError::UnknownCategory(category.to_string()))
    }
}

/// Registration record for one converter.
#[derive(Debug, Clone)]
pub struct ConverterDescriptor {
    pub name: String,
    pub category: String,
    pub description: String,
    pub input_formats: Vec<FormatId>,
    pub output_formats: Vec<FormatId>,
    pub parameters: ParameterSchema,
    factory: ConverterFactory,
}

impl ConverterDescriptor {
    fn describe(category: &str, factory: ConverterFactory) -> (Self, Box<dyn Converter>) {
        let sample = factory.create();
        let descriptor = Self {
            name: sample.name().to_string(),
            category: category.to_string(),
            description: sample.description().to_string(),
            input_formats: unique(sample.input_formats()),
            output_formats: unique(sample.output_formats()),
            parameters: sample.parameters(),
            factory,
        };
        (descriptor, sample)
    }

    /// Create a new converter instance.
    pub fn instantiate(&self) -> Box<dyn Converter> {
        self.factory.create()
    }
}

fn unique(formats: Vec<FormatId>) -> Vec<FormatId> {
    let mut seen = HashSet::new();
    formats
        .into_iter()
        .filter(|f| !f.is_empty() && seen.insert(f.clone()))
        .collect()
}

/// One step of a conversion path.
#[derive(Clone)]
pub struct PathStage {
    pub converter: Arc<dyn Converter>,
    pub descriptor: Arc<ConverterDescriptor>,
    pub input_format: FormatId,
    pub output_format: FormatId,
}

impl fmt::Debug for PathStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathStage")
            .field("converter", &self.descriptor.name)
            .field("category", &self.descriptor.category)
            .field("input_format", &self.input_format)
            .field("output_format", &self.output_format)
            .finish()
    }
}

/// Ordered converter chain from one format to another.
#[derive(Debug, Clone)]
pub struct ConversionPath {
    stages: Vec<PathStage>,
}

impl ConversionPath {
    /// Single copy stage for same-format requests.
    pub fn identity(format: &FormatId) -> Self {
        let id = format.clone();
        let factory = ConverterFactory::new(move || Box::new(IdentityConverter::new(id.clone())));
        let (descriptor, converter) = ConverterDescriptor::describe("identity", factory);
        Self {
            stages: vec![PathStage {
                converter: Arc::from(converter),
                descriptor: Arc::new(descriptor),
                input_format: format.clone(),
                output_format: format.clone(),
            }],
        }
    }

    pub fn stages(&self) -> &[PathStage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn is_direct(&self) -> bool {
        self.stages.len() == 1
    }

    /// Formats visited by the path, input first.
    pub fn formats(&self) -> Vec<FormatId> {
        let mut formats: Vec<FormatId> = self
            .stages
            .first()
            .map(|s| s.input_format.clone())
            .into_iter()
            .collect();
        formats.extend(self.stages.iter().map(|s| s.output_format.clone()));
        formats
    }
}

impl fmt::Display for ConversionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.stages.iter().map(|s| s.descriptor.name.as_str()).collect();
        let formats: Vec<String> = self.formats().iter().map(|f| f.to_string()).collect();
        write!(f, "{} via [{}]", formats.join(" -> "), names.join(", "))
    }
}

/// Index of converters by (input format, output format).
///
/// Built once by [`Registry::discover`]. After construction only the
/// instance cache changes; one converter instance is built per pair, on
/// first request, and shared afterwards.
pub struct Registry {
    index: BTreeMap<FormatId, BTreeMap<FormatId, Arc<ConverterDescriptor>>>,
    extensions: BTreeMap<FormatId, Vec<String>>,
    categories: BTreeMap<String, BTreeSet<FormatId>>,
    instances: DashMap<(FormatId, FormatId), Arc<dyn Converter>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            index: BTreeMap::new(),
            extensions: BTreeMap::new(),
            categories: BTreeMap::new(),
            instances: DashMap::new(),
        }
    }

    /// Build a registry from every enabled category of `provider`.
    ///
    /// A category that fails to load is logged and skipped.
    pub fn discover(provider: &dyn ConverterProvider, config: &ConvertersConfig) -> Self {
        let mut registry = Self::new();

        for category in provider.categories() {
            if !config.is_enabled(&category) {
                info!("Skipping disabled converter category '{}'", category);
                continue;
            }

            match provider.load(&category) {
                Ok(factories) => {
                    let count = factories.len();
                    for factory in factories {
                        registry.register(&category, factory);
                    }
                    debug!("Loaded {} converter(s) from category '{}'", count, category);
                }
                Err(e) => {
                    error!("Error loading converter category '{}': {}", category, e);
                }
            }
        }

        info!(
            "Converter registry ready: {} pairs across {} categories",
            registry.pair_count(),
            registry.categories.len()
        );
        registry
    }

    /// Register a converter for every pair of its input/output
    /// cross-product except self-pairs. Returns the number of pairs indexed.
    pub fn register(&mut self, category: &str, factory: ConverterFactory) -> usize {
        let (descriptor, sample) = ConverterDescriptor::describe(category, factory);

        if descriptor.input_formats.is_empty() || descriptor.output_formats.is_empty() {
            warn!(
                "Converter '{}' declares no input or output formats, skipping",
                descriptor.name
            );
            return 0;
        }

        for format in descriptor
            .input_formats
            .iter()
            .chain(descriptor.output_formats.iter())
        {
            self.extensions
                .entry(format.clone())
                .or_insert_with(|| normalize_extensions(format, sample.format_extensions(format)));
            self.categories
                .entry(category.to_string())
                .or_default()
                .insert(format.clone());
        }

        let descriptor = Arc::new(descriptor);
        let mut pairs = 0;
        for input in &descriptor.input_formats {
            for output in &descriptor.output_formats {
                if input == output {
                    continue;
                }
                let previous = self
                    .index
                    .entry(input.clone())
                    .or_default()
                    .insert(output.clone(), Arc::clone(&descriptor));
                if let Some(previous) = previous {
                    debug!(
                        "Converter '{}' replaces '{}' for {} -> {}",
                        descriptor.name, previous.name, input, output
                    );
                }
                self.instances.remove(&(input.clone(), output.clone()));
                pairs += 1;
            }
        }

        debug!(
            "Registered converter '{}' ({}) for {} pairs",
            descriptor.name, category, pairs
        );
        pairs
    }

    /// Shared converter instance for a format pair.
    ///
    /// Returns `None` for unregistered pairs, including self-pairs.
    pub fn get_converter(
        &self,
        input: impl AsRef<str>,
        output: impl AsRef<str>,
    ) -> Option<Arc<dyn Converter>> {
        let input = FormatId::new(input);
        let output = FormatId::new(output);
        let descriptor = self.index.get(&input)?.get(&output)?;

        let instance = self
            .instances
            .entry((input, output))
            .or_insert_with(|| Arc::from(descriptor.instantiate()));
        Some(Arc::clone(instance.value()))
    }

    /// Descriptor registered for a format pair.
    pub fn descriptor(
        &self,
        input: impl AsRef<str>,
        output: impl AsRef<str>,
    ) -> Option<Arc<ConverterDescriptor>> {
        self.index
            .get(&FormatId::new(input))?
            .get(&FormatId::new(output))
            .cloned()
    }

    /// Adjacency map: input format to sorted output formats.
    pub fn conversion_map(&self) -> BTreeMap<FormatId, Vec<FormatId>> {
        self.index
            .iter()
            .map(|(input, outputs)| (input.clone(), outputs.keys().cloned().collect()))
            .collect()
    }

    /// Extensions recorded for a format; empty if the format is unknown.
    pub fn format_extensions(&self, format: impl AsRef<str>) -> Vec<String> {
        self.extensions
            .get(&FormatId::new(format))
            .cloned()
            .unwrap_or_default()
    }

    /// Format for a file extension.
    ///
    /// Registered formats are searched first, preferring a format named like
    /// the extension; the static format table is the fallback.
    pub fn resolve_extension(&self, extension: &str) -> Option<FormatId> {
        let ext = FormatId::new(extension);
        if ext.is_empty() {
            return None;
        }

        if self
            .extensions
            .get(&ext)
            .is_some_and(|exts| exts.iter().any(|e| e == ext.as_str()))
        {
            return Some(ext);
        }

        self.extensions
            .iter()
            .filter(|(_, exts)| exts.iter().any(|e| e == ext.as_str()))
            .map(|(format, _)| format)
            .min_by(|a, b| format::priority_cmp(a, b))
            .cloned()
            .or_else(|| format::format_for_extension(ext.as_str()))
    }

    /// Formats grouped by converter category, optionally for one category.
    pub fn supported_formats(&self, category: Option<&str>) -> BTreeMap<String, Vec<FormatId>> {
        self.categories
            .iter()
            .filter(|(name, _)| category.map_or(true, |c| c == name.as_str()))
            .map(|(name, formats)| (name.clone(), formats.iter().cloned().collect()))
            .collect()
    }

    /// Every format that appears in at least one registered converter.
    pub fn formats(&self) -> Vec<FormatId> {
        self.extensions.keys().cloned().collect()
    }

    /// Names of the categories that registered at least one converter.
    pub fn categories(&self) -> Vec<String> {
        self.categories.keys().cloned().collect()
    }

    /// Number of indexed (input, output) pairs.
    pub fn pair_count(&self) -> usize {
        self.index.values().map(BTreeMap::len).sum()
    }

    /// Shortest converter chain from `input` to `output` of at most
    /// `max_steps` stages.
    ///
    /// Breadth-first over the format graph. Neighbours are expanded in
    /// format priority order, so among equally short paths the result is
    /// always the same.
    pub fn find_path(
        &self,
        input: impl AsRef<str>,
        output: impl AsRef<str>,
        max_steps: usize,
    ) -> Option<ConversionPath> {
        let input = FormatId::new(input);
        let output = FormatId::new(output);
        if input == output || max_steps == 0 {
            return None;
        }

        let mut parents: HashMap<FormatId, FormatId> = HashMap::new();
        let mut visited: HashSet<FormatId> = HashSet::from([input.clone()]);
        let mut frontier = vec![input.clone()];

        for _ in 0..max_steps {
            let mut next = Vec::new();
            for node in &frontier {
                let Some(neighbours) = self.index.get(node) else {
                    continue;
                };
                let mut ordered: Vec<&FormatId> = neighbours.keys().collect();
                ordered.sort_by(|a, b| format::priority_cmp(a, b));

                for neighbour in ordered {
                    if !visited.insert(neighbour.clone()) {
                        continue;
                    }
                    parents.insert(neighbour.clone(), node.clone());
                    if *neighbour == output {
                        return self.build_path(&parents, &input, &output);
                    }
                    next.push(neighbour.clone());
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        None
    }

    fn build_path(
        &self,
        parents: &HashMap<FormatId, FormatId>,
        input: &FormatId,
        output: &FormatId,
    ) -> Option<ConversionPath> {
        let mut chain = vec![output.clone()];
        let mut current = output;
        while current != input {
            current = parents.get(current)?;
            chain.push(current.clone());
        }
        chain.reverse();

        let stages = chain
            .windows(2)
            .map(|pair| {
                Some(PathStage {
                    converter: self.get_converter(&pair[0], &pair[1])?,
                    descriptor: self.descriptor(&pair[0], &pair[1])?,
                    input_format: pair[0].clone(),
                    output_format: pair[1].clone(),
                })
            })
            .collect::<Option<Vec<_>>>()?;

        let path = ConversionPath { stages };
        debug!("Resolved conversion path {}", path);
        Some(path)
    }
}

fn normalize_extensions(format: &FormatId, extensions: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let normalized: Vec<String> = extensions
        .iter()
        .map(|e| FormatId::new(e).to_string())
        .filter(|e| !e.is_empty() && seen.insert(e.clone()))
        .collect();
    if normalized.is_empty() {
        vec![format.to_string()]
    } else {
        normalized
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("pairs", &self.pair_count())
            .field("categories", &self.categories.keys().collect::<Vec<_>>())
            .field("cached_instances", &self.instances.len())
            .finish()
    }
}
