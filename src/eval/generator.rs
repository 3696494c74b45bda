// eval/generator.rs - Graph, compiled program and settings behind one handle
//
// `VoxelGraphGenerator` is what a voxel engine talks to. Editing goes
// through `graph_mut()`, `compile()` swaps in a fresh `Arc<Program>`, and
// generation only ever runs a program whose revision matches the graph.
// Callers that grabbed a `program_handle()` keep a valid snapshot across
// later recompiles.

use crate::eval::bounds::Bounds;
use crate::eval::compiled::{compile, Program};
use crate::eval::error::{BoundsError, CompileError, GenerateError, GraphError, SettingsError};
use crate::eval::graph::{NodeId, ProgramGraph};
use crate::eval::node_types::NodeTypeId;
use crate::eval::nodes::EvalState;
use crate::eval::volume::{self, BlockBuffer, BlockRequest, MAX_LOD};
use crate::schema::GeneratorSettings;
use log::debug;
use std::sync::Arc;
use std::time::Instant;

/// Edge length of the synthetic batch used by the profiling hook.
const PROFILE_EDGE: usize = 16;
const PROFILE_ITERATIONS: u32 = 10;

#[derive(Debug, Default)]
pub struct VoxelGraphGenerator {
    graph: ProgramGraph,
    program: Option<Arc<Program>>,
    settings: GeneratorSettings,
}

impl VoxelGraphGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_graph(graph: ProgramGraph) -> Self {
        VoxelGraphGenerator {
            graph,
            ..Self::default()
        }
    }

    pub fn graph(&self) -> &ProgramGraph {
        &self.graph
    }

    /// Mutable access for editing. Any successful edit makes the current
    /// program stale until the next `compile()`.
    pub fn graph_mut(&mut self) -> &mut ProgramGraph {
        &mut self.graph
    }

    pub fn set_graph(&mut self, graph: ProgramGraph) {
        self.graph = graph;
        self.program = None;
    }

    /// Compile the current graph. On failure the previous program is
    /// dropped and generation is refused until a compile succeeds.
    pub fn compile(&mut self) -> Result<(), CompileError> {
        match compile(&self.graph) {
            Ok(program) => {
                self.program = Some(Arc::new(program));
                Ok(())
            }
            Err(e) => {
                self.program = None;
                Err(e)
            }
        }
    }

    /// True if a program exists and matches the graph's current revision.
    pub fn is_compiled(&self) -> bool {
        self.program
            .as_ref()
            .is_some_and(|p| p.revision() == self.graph.revision())
    }

    /// Shared handle to the current program.
    pub fn program_handle(&self) -> Result<Arc<Program>, GenerateError> {
        match &self.program {
            Some(p) if p.revision() == self.graph.revision() => Ok(p.clone()),
            _ => Err(GenerateError::NotCompiled),
        }
    }

    /// Fill one block. Requests above `MAX_LOD` are refused.
    pub fn generate_block(&self, request: &BlockRequest) -> Result<BlockBuffer, GenerateError> {
        if request.lod > MAX_LOD {
            return Err(GenerateError::LodTooLarge {
                lod: request.lod,
                max: MAX_LOD,
            });
        }
        let program = self.program_handle()?;
        Ok(volume::generate_block(&program, &self.settings, request))
    }

    /// Scaled SDF at one voxel, with bounds applied.
    pub fn generate_single(&self, position: [i32; 3]) -> Result<f64, GenerateError> {
        let program = self.program_handle()?;
        Ok(volume::generate_single(&program, &self.settings, position))
    }

    // ── Settings and bounds ─────────────────────────────────────────

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Replace all settings. Invalid settings leave the previous ones in
    /// place.
    pub fn set_settings(&mut self, settings: GeneratorSettings) -> Result<(), SettingsError> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    pub fn set_iso_scale(&mut self, iso_scale: f64) -> Result<(), SettingsError> {
        if !iso_scale.is_finite() {
            return Err(SettingsError::NonFiniteIsoScale(iso_scale));
        }
        self.settings.iso_scale = iso_scale;
        Ok(())
    }

    pub fn set_clip_threshold(&mut self, clip_threshold: f64) -> Result<(), SettingsError> {
        if !(clip_threshold.is_finite() && clip_threshold >= 0.0) {
            return Err(SettingsError::InvalidClipThreshold(clip_threshold));
        }
        self.settings.clip_threshold = clip_threshold;
        Ok(())
    }

    pub fn bounds(&self) -> &Bounds {
        &self.settings.bounds
    }

    /// Replace the active bounds. Invalid bounds leave the previous ones
    /// in place.
    pub fn set_bounds(&mut self, bounds: Bounds) -> Result<(), BoundsError> {
        bounds.validate()?;
        debug!("bounds set to {bounds:?}");
        self.settings.bounds = bounds;
        Ok(())
    }

    pub fn set_vertical_bounds(
        &mut self,
        min_y: i32,
        max_y: i32,
        bottom_sdf: f32,
        top_sdf: f32,
        bottom_type: u64,
        top_type: u64,
    ) -> Result<(), BoundsError> {
        self.set_bounds(Bounds::vertical(min_y, max_y, bottom_sdf, top_sdf, bottom_type, top_type))
    }

    pub fn set_box_bounds(&mut self, min: [i32; 3], max: [i32; 3], sdf: f32, voxel_type: u64) -> Result<(), BoundsError> {
        self.set_bounds(Bounds::boxed(min, max, sdf, voxel_type))
    }

    pub fn clear_bounds(&mut self) {
        debug!("bounds cleared");
        self.settings.bounds = Bounds::None;
    }

    // ── Debug ───────────────────────────────────────────────────────

    /// Mean cost of one voxel, in microseconds, over a synthetic 16³ batch.
    pub fn debug_measure_microseconds_per_voxel(&self) -> Result<f64, GenerateError> {
        let program = self.program_handle()?;

        let mut positions = Vec::with_capacity(PROFILE_EDGE.pow(3));
        for y in 0..PROFILE_EDGE {
            for z in 0..PROFILE_EDGE {
                for x in 0..PROFILE_EDGE {
                    positions.push([x as f64, y as f64, z as f64]);
                }
            }
        }
        let mut out = vec![0.0; positions.len()];
        let mut state = EvalState::new();

        let start = Instant::now();
        for _ in 0..PROFILE_ITERATIONS {
            program.run_with(&positions, &mut out, &mut state);
        }
        let elapsed = start.elapsed().as_secs_f64() * 1e6;

        let voxels = positions.len() as f64 * PROFILE_ITERATIONS as f64;
        let per_voxel = elapsed / voxels;
        debug!("profiled {} instructions: {per_voxel:.4} µs/voxel", program.len());
        Ok(per_voxel)
    }

    /// Replace the graph with a rolling-hills demo:
    /// `y + sin(x * 0.1) * 10 + sin(z * 0.1) * 10`. The result is not
    /// compiled.
    pub fn load_waves_preset(&mut self) -> Result<(), GraphError> {
        let graph = waves_graph()?;
        self.set_graph(graph);
        Ok(())
    }
}

fn waves_graph() -> Result<ProgramGraph, GraphError> {
    let mut g = ProgramGraph::new();

    let constant = |g: &mut ProgramGraph, value: f64, pos: [f32; 2]| -> Result<NodeId, GraphError> {
        let id = g.create_node(NodeTypeId::Constant, pos);
        g.set_node_param(id, 0, value)?;
        Ok(id)
    };
    let frequency = constant(&mut g, 0.1, [0.0, 200.0])?;
    let amplitude = constant(&mut g, 10.0, [0.0, 300.0])?;

    // sin(axis * frequency) * amplitude
    let wave = |g: &mut ProgramGraph, axis: NodeTypeId, row: f32| -> Result<NodeId, GraphError> {
        let input = g.create_node(axis, [0.0, row]);
        let scaled = g.create_node(NodeTypeId::Multiply, [150.0, row]);
        let sine = g.create_node(NodeTypeId::Sine, [300.0, row]);
        let height = g.create_node(NodeTypeId::Multiply, [450.0, row]);
        g.add_connection(input, 0, scaled, 0)?;
        g.add_connection(frequency, 0, scaled, 1)?;
        g.add_connection(scaled, 0, sine, 0)?;
        g.add_connection(sine, 0, height, 0)?;
        g.add_connection(amplitude, 0, height, 1)?;
        Ok(height)
    };
    let wave_x = wave(&mut g, NodeTypeId::InputX, 0.0)?;
    let wave_z = wave(&mut g, NodeTypeId::InputZ, 100.0)?;

    let y = g.create_node(NodeTypeId::InputY, [300.0, -100.0]);
    let sum_a = g.create_node(NodeTypeId::Add, [600.0, 0.0]);
    let sum_b = g.create_node(NodeTypeId::Add, [750.0, 0.0]);
    let out = g.create_node(NodeTypeId::OutputSdf, [900.0, 0.0]);
    g.add_connection(y, 0, sum_a, 0)?;
    g.add_connection(wave_x, 0, sum_a, 1)?;
    g.add_connection(sum_a, 0, sum_b, 0)?;
    g.add_connection(wave_z, 0, sum_b, 1)?;
    g.add_connection(sum_b, 0, out, 0)?;

    Ok(g)
}
