use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use stoat_core::{Error, Result, TensorRef};

use crate::grid::DispatchGrid;
use crate::params::{ParamLayout, ScalarValue};

// KernelVariantRegistry — From variant key to concrete kernel
//
// Each backend ships a static table per operation family mapping a packed
// variant key to a KernelDescriptor. The tables are built once behind a
// Lazy and the builder panics on a duplicate key, so an aliased key is
// caught the first time the table is touched (unit tests touch every
// table). A lookup miss is a hard compile failure naming the operation and
// key; no generic fallback path is assumed to exist.

/// Hardware backend a kernel table belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Reference C kernels.
    Cpu,
    /// OpenCL-like compute kernels.
    Cl,
    /// Vector-ISA kernels.
    Evis,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Backend::Cpu => "cpu",
            Backend::Cl => "cl",
            Backend::Evis => "evis",
        };
        write!(f, "{}", s)
    }
}

/// Operation family, selecting which table a key is looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpFamily {
    Elementwise,
    Reduce,
    MatMul,
}

impl fmt::Display for OpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OpFamily::Elementwise => "elementwise",
            OpFamily::Reduce => "reduce",
            OpFamily::MatMul => "matmul",
        };
        write!(f, "{}", s)
    }
}

/// Everything an initializer sees when producing backend resources: the
/// final bound tensors and the planned grid.
pub struct InitCtx<'a> {
    pub inputs: &'a [TensorRef],
    pub outputs: &'a [TensorRef],
    pub grid: &'a DispatchGrid,
}

/// Produces the scalar constants the kernel's parameter list expects,
/// invoked at finalize time with the final tensor handles.
pub type Initializer = fn(&InitCtx) -> Result<Vec<ScalarValue>>;

/// One concrete, hand-specialized kernel variant.
#[derive(Clone)]
pub struct KernelDescriptor {
    /// Packed variant key this descriptor is registered under.
    pub key: u32,
    /// Entry point inside the kernel source/binary.
    pub entry_name: String,
    /// Resource name used to locate the kernel payload.
    pub source_resource: String,
    /// Ordered parameter slots.
    pub param_layout: ParamLayout,
    /// Output elements one work-item produces per axis.
    pub global_scale: [u32; 3],
    /// Tile width axis 0 of the grid is rounded to.
    pub align: u32,
    /// Scalar-constant producer.
    pub initializer: Initializer,
}

impl fmt::Debug for KernelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelDescriptor")
            .field("key", &format_args!("{:#010x}", self.key))
            .field("entry_name", &self.entry_name)
            .field("source_resource", &self.source_resource)
            .finish()
    }
}

/// Accumulates one (backend, family) table. `register` panics on a
/// duplicate key: that is a table-definition bug, and it must never
/// reach a lookup.
pub struct TableBuilder {
    backend: Backend,
    family: OpFamily,
    map: HashMap<u32, KernelDescriptor>,
}

impl TableBuilder {
    fn new(backend: Backend, family: OpFamily) -> Self {
        TableBuilder {
            backend,
            family,
            map: HashMap::new(),
        }
    }

    pub fn register(&mut self, desc: KernelDescriptor) {
        if let Some(prev) = self.map.insert(desc.key, desc) {
            panic!(
                "variant key {:#010x} registered twice in {}/{} (first: {})",
                prev.key, self.backend, self.family, prev.entry_name
            );
        }
    }

    fn finish(self) -> HashMap<u32, KernelDescriptor> {
        self.map
    }
}

type Tables = HashMap<(Backend, OpFamily), HashMap<u32, KernelDescriptor>>;

static TABLES: Lazy<Tables> = Lazy::new(build_tables);

fn build_tables() -> Tables {
    let mut tables = Tables::new();
    for backend in [Backend::Cpu, Backend::Cl, Backend::Evis] {
        for family in [OpFamily::Elementwise, OpFamily::Reduce, OpFamily::MatMul] {
            let mut builder = TableBuilder::new(backend, family);
            match family {
                OpFamily::Elementwise => crate::kernels::elementwise::register(backend, &mut builder),
                OpFamily::Reduce => crate::kernels::reduce::register(backend, &mut builder),
                OpFamily::MatMul => crate::kernels::matmul::register(backend, &mut builder),
            }
            tables.insert((backend, family), builder.finish());
        }
    }
    tables
}

/// Look up the kernel variant for a computed key.
pub fn lookup(backend: Backend, family: OpFamily, op: &str, key: u32) -> Result<&'static KernelDescriptor> {
    TABLES
        .get(&(backend, family))
        .and_then(|t| t.get(&key))
        .ok_or_else(|| Error::UnsupportedKernelVariant {
            op: op.to_string(),
            key,
            backend: backend.to_string(),
        })
}

/// Number of variants registered for one (backend, family) table.
/// Forcing this from a test also exercises the duplicate-key panic in
/// every table builder.
pub fn variant_count(backend: Backend, family: OpFamily) -> usize {
    TABLES.get(&(backend, family)).map_or(0, |t| t.len())
}

/// All registered keys of one table, for disjointness property tests.
pub fn registered_keys(backend: Backend, family: OpFamily) -> Vec<u32> {
    TABLES
        .get(&(backend, family))
        .map(|t| t.keys().copied().collect())
        .unwrap_or_default()
}
