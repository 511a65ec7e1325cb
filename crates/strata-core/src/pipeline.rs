//! Pipelines as a program plus a name-to-resource binding map.
//!
//! Instead of reflecting each shader into its own type, a pipeline holds
//! an ordered [`Bindings`] map. Each culling stage fills the map through a
//! hand-written binding function, so the shape of its inputs and outputs
//! lives next to the stage that records it.

use bytemuck::Pod;
use indexmap::IndexMap;

use crate::id::ProgramId;
use crate::view::{BufferView, SamplerDesc, TextureView};

/// A resource bound to a named shader slot.
#[derive(Clone, Debug, PartialEq)]
pub enum Binding {
    /// A buffer range.
    Buffer(BufferView),
    /// A texture with all of its mips.
    Texture(TextureView),
    /// Sampler state.
    Sampler(SamplerDesc),
    /// An inline constant block.
    Constants(Vec<u8>),
}

/// Ordered map from binding name to resource.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bindings {
    entries: IndexMap<&'static str, Binding>,
}

impl Bindings {
    /// An empty binding map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `view` to `name`, replacing any previous binding.
    pub fn buffer(mut self, name: &'static str, view: BufferView) -> Self {
        self.set(name, Binding::Buffer(view));
        self
    }

    /// Bind `view` to `name`, replacing any previous binding.
    pub fn texture(mut self, name: &'static str, view: TextureView) -> Self {
        self.set(name, Binding::Texture(view));
        self
    }

    /// Bind `sampler` to `name`.
    pub fn sampler(mut self, name: &'static str, sampler: SamplerDesc) -> Self {
        self.set(name, Binding::Sampler(sampler));
        self
    }

    /// Bind the bytes of `value` as a constant block.
    pub fn constants<T: Pod>(mut self, name: &'static str, value: &T) -> Self {
        self.set(
            name,
            Binding::Constants(bytemuck::bytes_of(value).to_vec()),
        );
        self
    }

    /// Insert or replace a binding in place.
    pub fn set(&mut self, name: &'static str, binding: Binding) {
        self.entries.insert(name, binding);
    }

    /// Look up a binding.
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.entries.get(name)
    }

    /// Look up a buffer binding.
    pub fn get_buffer(&self, name: &str) -> Option<&BufferView> {
        match self.entries.get(name) {
            Some(Binding::Buffer(view)) => Some(view),
            _ => None,
        }
    }

    /// Iterate bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Binding)> {
        self.entries.iter().map(|(name, binding)| (*name, binding))
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether every bound buffer and texture still has a live owner.
    pub fn resources_alive(&self) -> bool {
        self.entries.values().all(|binding| match binding {
            Binding::Buffer(view) => view.is_alive(),
            Binding::Texture(view) => view.is_alive(),
            Binding::Sampler(_) | Binding::Constants(_) => true,
        })
    }
}

/// A compute program with its bindings.
#[derive(Clone, Debug, PartialEq)]
pub struct ComputePipeline {
    program: ProgramId,
    bindings: Bindings,
}

impl ComputePipeline {
    /// Pair `program` with `bindings`.
    pub fn new(program: ProgramId, bindings: Bindings) -> Self {
        Self { program, bindings }
    }

    /// The program to run.
    pub fn program(&self) -> ProgramId {
        self.program
    }

    /// The bound resources.
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }
}

/// A graphics program with its bindings, used by indirect draws.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphicsPipeline {
    program: ProgramId,
    bindings: Bindings,
}

impl GraphicsPipeline {
    /// Pair `program` with `bindings`.
    pub fn new(program: ProgramId, bindings: Bindings) -> Self {
        Self { program, bindings }
    }

    /// The program to run.
    pub fn program(&self) -> ProgramId {
        self.program
    }

    /// The bound resources.
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_keep_insertion_order_and_replace_in_place() {
        let bindings = Bindings::new()
            .sampler("pyramid_sampler", SamplerDesc::POINT_CLAMP)
            .constants("constants", &[1u32, 2, 3])
            .constants("params", &7u32)
            .sampler("pyramid_sampler", SamplerDesc::default());

        let names: Vec<_> = bindings.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["pyramid_sampler", "constants", "params"]);
        assert_eq!(bindings.len(), 3);
        assert!(bindings.get_buffer("constants").is_none());
        match bindings.get("params") {
            Some(Binding::Constants(bytes)) => assert_eq!(bytes, &7u32.to_ne_bytes()),
            other => panic!("unexpected binding {other:?}"),
        }
    }

    #[test]
    fn empty_bindings_are_alive() {
        assert!(Bindings::new().is_empty());
        assert!(Bindings::new().resources_alive());
    }
}
