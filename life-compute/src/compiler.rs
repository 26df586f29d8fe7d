//! # Kernel Compiler
//!
//! WGSL front-end shared by both backends. Compiling parses and validates
//! the source with naga and reflects every compute entry point into a
//! [`KernelSignature`]: workgroup size plus the `@group(0)` parameters the
//! entry point actually touches, keyed by `@binding`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use naga::valid::{Capabilities, GlobalUse, ValidationFlags, Validator};

use life_core::buffer::Access;
use life_core::config::KernelConfig;
use life_core::error::{LifeError, LifeResult};

use crate::shaders::LIFE_SHADER;

/// Where kernel source comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KernelSource {
    /// Source compiled into this crate
    Embedded,
    /// WGSL file read at startup
    File(PathBuf),
}

impl KernelSource {
    pub fn from_config(config: &KernelConfig) -> Self {
        match &config.path {
            Some(path) => KernelSource::File(path.clone()),
            None => KernelSource::Embedded,
        }
    }

    /// Read the source text
    pub fn load(&self) -> LifeResult<String> {
        match self {
            KernelSource::Embedded => Ok(LIFE_SHADER.to_string()),
            KernelSource::File(path) => {
                std::fs::read_to_string(path).map_err(|source| LifeError::MissingSource {
                    path: path.clone(),
                    source,
                })
            }
        }
    }
}

impl fmt::Display for KernelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelSource::Embedded => write!(f, "embedded kernels"),
            KernelSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// How a parameter is declared
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    /// `var<storage, ..>`: takes a buffer
    Storage,
    /// `var<uniform>`: takes a scalar
    Uniform,
}

/// One parameter used by an entry point
#[derive(Clone, Debug)]
pub struct ParamInfo {
    pub binding: u32,
    pub name: Option<String>,
    pub kind: ParamKind,
    pub reads: bool,
    pub writes: bool,
}

/// Reflected interface of one compute entry point
#[derive(Clone, Debug)]
pub struct KernelSignature {
    pub name: String,
    pub workgroup_size: [u32; 3],
    pub params: BTreeMap<u32, ParamInfo>,
}

impl KernelSignature {
    fn param(&self, index: u32) -> LifeResult<&ParamInfo> {
        self.params.get(&index).ok_or_else(|| {
            LifeError::argument(format!("{} has no parameter at index {}", self.name, index))
        })
    }

    /// Can a buffer with `access` be bound at `index`?
    pub fn check_buffer_binding(&self, index: u32, access: Access) -> LifeResult<()> {
        let param = self.param(index)?;
        if param.kind != ParamKind::Storage {
            return Err(LifeError::argument(format!(
                "{} parameter {} takes a scalar, not a buffer",
                self.name, index
            )));
        }
        if param.writes && !access.kernel_writes() {
            return Err(LifeError::argument(format!(
                "{} writes parameter {} but the buffer is {:?}",
                self.name, index, access
            )));
        }
        if param.reads && !param.writes && !access.kernel_reads() {
            return Err(LifeError::argument(format!(
                "{} only reads parameter {} but the buffer is {:?}",
                self.name, index, access
            )));
        }
        Ok(())
    }

    /// Can a scalar be bound at `index`?
    pub fn check_scalar_binding(&self, index: u32) -> LifeResult<()> {
        let param = self.param(index)?;
        if param.kind != ParamKind::Uniform {
            return Err(LifeError::argument(format!(
                "{} parameter {} takes a buffer, not a scalar",
                self.name, index
            )));
        }
        Ok(())
    }

    /// Fails on the first parameter with no binding
    pub fn check_all_bound(&self, is_bound: impl Fn(u32) -> bool) -> LifeResult<()> {
        match self.params.keys().find(|&&index| !is_bound(index)) {
            Some(index) => Err(LifeError::argument(format!(
                "argument {} of {} is not bound",
                index, self.name
            ))),
            None => Ok(()),
        }
    }
}

/// A parsed, validated, reflected program
#[derive(Clone, Debug)]
pub struct CompiledProgram {
    source: String,
    kernels: Vec<KernelSignature>,
}

impl CompiledProgram {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kernels(&self) -> &[KernelSignature] {
        &self.kernels
    }

    /// Look up an entry point by name
    pub fn signature(&self, entry_point: &str) -> LifeResult<&KernelSignature> {
        self.kernels
            .iter()
            .find(|k| k.name == entry_point)
            .ok_or_else(|| LifeError::KernelNotFound(entry_point.to_string()))
    }
}

/// WGSL compiler
pub struct KernelCompiler {}

impl KernelCompiler {
    pub fn new() -> Self {
        Self {}
    }

    /// Parse, validate and reflect. Errors carry naga's rendered report.
    pub fn compile(&self, source: &str) -> LifeResult<CompiledProgram> {
        let module = naga::front::wgsl::parse_str(source)
            .map_err(|e| LifeError::compile(e.emit_to_string(source)))?;

        let info = Validator::new(ValidationFlags::all(), Capabilities::default())
            .validate(&module)
            .map_err(|e| LifeError::compile(e.emit_to_string(source)))?;

        let mut kernels = Vec::new();
        for (index, entry) in module.entry_points.iter().enumerate() {
            if entry.stage != naga::ShaderStage::Compute {
                continue;
            }
            let usage = info.get_entry_point(index);
            let mut params = BTreeMap::new();

            for (handle, global) in module.global_variables.iter() {
                let used = usage[handle];
                if used.is_empty() {
                    continue;
                }
                let Some(binding) = &global.binding else {
                    continue;
                };
                if binding.group != 0 {
                    return Err(LifeError::compile(format!(
                        "{}: only @group(0) is supported, found @group({}) @binding({})",
                        entry.name, binding.group, binding.binding
                    )));
                }
                let kind = match global.space {
                    naga::AddressSpace::Storage { .. } => ParamKind::Storage,
                    naga::AddressSpace::Uniform => ParamKind::Uniform,
                    other => {
                        return Err(LifeError::compile(format!(
                            "{}: unsupported parameter space {:?} at @binding({})",
                            entry.name, other, binding.binding
                        )));
                    }
                };
                params.insert(
                    binding.binding,
                    ParamInfo {
                        binding: binding.binding,
                        name: global.name.clone(),
                        kind,
                        reads: used.contains(GlobalUse::READ),
                        writes: used.contains(GlobalUse::WRITE),
                    },
                );
            }

            kernels.push(KernelSignature {
                name: entry.name.clone(),
                workgroup_size: entry.workgroup_size,
                params,
            });
        }

        tracing::debug!(
            "Compiled {} kernel(s): {}",
            kernels.len(),
            kernels.iter().map(|k| k.name.as_str()).collect::<Vec<_>>().join(", ")
        );

        Ok(CompiledProgram {
            source: source.to_string(),
            kernels,
        })
    }
}

impl Default for KernelCompiler {
    fn default() -> Self {
        Self::new()
    }
}
