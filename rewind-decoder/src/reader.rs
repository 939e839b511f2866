//! The capture reader: decode loop, per-record effects and finalize.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::DeflateDecoder;
use rewind_core::block::{Block, BlockType};
use rewind_core::codec;
use rewind_core::entity::{Entity, EntityGraph, EntityId};
use rewind_core::series::FrameStampedSeries;
use rewind_core::types::{Color, FrameIndex, FrameRange, Point, Transform};

use crate::Result;

/// One decoded log record.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// `None` for global logs not attached to an entity.
    pub entity: Option<EntityId>,
    pub category: String,
    pub message: String,
    pub color: Color,
}

/// Shape kind of a decoded draw command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawShape {
    #[default]
    None,
    Line,
    Circle,
    Sphere,
    Box,
    Capsule,
    Mesh,
}

/// A decoded draw/gizmo primitive.
///
/// The transform/point fields are reused per shape: lines run from the
/// transform translation to `p2`, circles store their normal in `p2` and
/// radius in `radius`, boxes store their dimensions in `p2`, meshes carry a
/// vertex list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityDrawCommand {
    pub entity: Option<EntityId>,
    pub category: String,
    pub shape: DrawShape,
    pub color: Color,
    pub xform: Transform,
    pub p2: Point,
    pub verts: Vec<Point>,
    pub radius: f32,
    pub frame: FrameIndex,
}

impl EntityDrawCommand {
    pub fn pos(&self) -> Point {
        self.xform.translation
    }

    pub fn end_point(&self) -> Point {
        self.p2
    }

    pub fn dimensions(&self) -> Point {
        self.p2
    }
}

/// One coalesced change of a string-valued dynamic parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicParamEntry {
    pub entity: EntityId,
    pub name: String,
    pub value: String,
    pub frame: FrameIndex,
    /// Number of `.`-separated segments in the value minus one; supports
    /// breadcrumb-style values such as state machine paths.
    pub depth: usize,
}

/// A fully decoded replay capture.
///
/// Built in a single pass over the byte stream, then frozen; every field
/// is immutable for the lifetime of the value and all queries are safe to
/// run concurrently.
#[derive(Debug)]
pub struct ReplayReader {
    /// Frame number → elapsed seconds. Seeded with a sentinel 0.0 so a
    /// capture without frame steps still has a valid frame 0.
    pub(crate) frame_times: Vec<f32>,
    /// Coarse skip list: floor(seconds) → index into `frame_times` from
    /// which a forward scan resumes during time→frame lookup.
    pub(crate) frames_for_times: Vec<usize>,

    pub(crate) entity_order: Vec<EntityId>,
    pub(crate) registry: HashMap<EntityId, Entity>,
    pub(crate) lifetimes: HashMap<EntityId, FrameRange>,
    pub(crate) graph: EntityGraph,

    pub(crate) transforms: HashMap<EntityId, FrameStampedSeries<Transform>>,
    pub(crate) logs: FrameStampedSeries<LogEntry>,
    pub(crate) log_frames: HashMap<EntityId, Vec<FrameIndex>>,
    pub(crate) dynamic_params: HashMap<EntityId, FrameStampedSeries<(String, String)>>,
    pub(crate) param_changes: HashMap<EntityId, BTreeMap<String, Vec<DynamicParamEntry>>>,
    pub(crate) dynamic_values: HashMap<EntityId, FrameStampedSeries<(String, f32)>>,
    pub(crate) draws: FrameStampedSeries<EntityDrawCommand>,
    pub(crate) creation_draws: HashMap<EntityId, Vec<EntityDrawCommand>>,

    pub(crate) entity_categories: BTreeSet<String>,
    pub(crate) log_categories: BTreeSet<String>,
    pub(crate) log_colors: BTreeSet<Color>,
    pub(crate) draw_categories: BTreeSet<String>,
    pub(crate) draw_colors: BTreeSet<Color>,
    pub(crate) parameter_names: BTreeSet<String>,
}

/// The default reader is a valid empty capture: one frame at time 0.0,
/// no entities. Every query is safe on it.
impl Default for ReplayReader {
    fn default() -> Self {
        Self {
            frame_times: vec![0.0],
            frames_for_times: Vec::new(),
            entity_order: Vec::new(),
            registry: HashMap::new(),
            lifetimes: HashMap::new(),
            graph: EntityGraph::new(),
            transforms: HashMap::new(),
            logs: FrameStampedSeries::new(),
            log_frames: HashMap::new(),
            dynamic_params: HashMap::new(),
            param_changes: HashMap::new(),
            dynamic_values: HashMap::new(),
            draws: FrameStampedSeries::new(),
            creation_draws: HashMap::new(),
            entity_categories: BTreeSet::new(),
            log_categories: BTreeSet::new(),
            log_colors: BTreeSet::new(),
            draw_categories: BTreeSet::new(),
            draw_colors: BTreeSet::new(),
            parameter_names: BTreeSet::new(),
        }
    }
}

impl ReplayReader {
    /// Loads a capture file.
    ///
    /// A missing file yields an empty reader rather than an error; callers
    /// must tolerate a reader with no entities and only the empty frame 0. A
    /// truncated file yields everything decoded before the truncation
    /// point. An unrecognized tag mid-stream is fatal: the file is corrupt
    /// or not a capture.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            let mut reader = Self::default();
            reader.finalize();
            return Ok(reader);
        }
        Self::from_stream(BufReader::new(File::open(path)?))
    }

    /// Decodes a capture from any seekable stream.
    ///
    /// Compression is auto-detected: a stream opening with the header tag
    /// as a raw little-endian int32 is uncompressed (the sentinel is
    /// consumed); anything else is rewound and read through a raw deflate
    /// decompressor, inside which the header appears as the first varint
    /// record.
    pub fn from_stream<R: Read + Seek>(mut stream: R) -> Result<Self> {
        let mut reader = Self::default();
        match codec::read_i32(&mut stream) {
            Ok(header) if header == BlockType::HEADER_TAG => {
                reader.decode(&mut stream)?;
            }
            Ok(_) => {
                stream.seek(SeekFrom::Start(0))?;
                reader.decode(&mut DeflateDecoder::new(stream))?;
            }
            Err(e) if e.is_eof() => {} // shorter than a header: empty capture
            Err(e) => return Err(e.into()),
        }
        reader.finalize();
        Ok(reader)
    }

    fn decode<R: Read>(&mut self, stream: &mut R) -> Result<()> {
        let mut last_xforms: HashMap<EntityId, Transform> = HashMap::new();
        loop {
            match Block::read(stream) {
                Ok(block) => self.apply(block, &mut last_xforms),
                // EOF mid-record is the normal end of a capture.
                Err(e) if e.is_eof() => break,
                // Corruption or wrong file type: abandon the load.
                Err(e @ rewind_core::Error::InvalidBlockTag(_)) => return Err(e.into()),
                // Anything else: keep the partial capture decoded so far.
                Err(e) => {
                    tracing::warn!(error = %e, "capture decode stopped early, keeping partial data");
                    break;
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, block: Block, last_xforms: &mut HashMap<EntityId, Transform>) {
        match block {
            Block::ReplayHeader => {}
            Block::FrameStep { total_time } => {
                self.frame_times.push(total_time);
                let index = self.frame_times.len() - 1;
                if total_time.is_finite() && total_time >= 0.0 {
                    let second = total_time as usize;
                    while self.frames_for_times.len() <= second {
                        self.frames_for_times.push(index);
                    }
                }
            }
            Block::EntityDef { frame, entity, parent, def } => {
                let Some(id) = entity.checked() else { return };
                self.entity_categories.insert(def.category_name.clone());
                match self.registry.get_mut(&id) {
                    Some(existing) => existing.redefine(def, parent, frame),
                    None => {
                        self.registry.insert(id, Entity::from_def(id, def, parent, frame));
                        self.entity_order.push(id);
                    }
                }
            }
            Block::EntityUndef { frame, entity } => {
                let Some(id) = entity.checked() else { return };
                if let Some(e) = self.registry.get(&id) {
                    self.lifetimes.insert(id, FrameRange::new(e.creation_frame, frame));
                }
            }
            Block::EntitySetPos { frame, entity, pos } => {
                let Some(id) = entity.checked() else { return };
                // Reuse the last known rotation; only translation changes.
                let mut xform = last_xforms.get(&id).copied().unwrap_or(Transform::IDENTITY);
                xform.translation = pos;
                self.push_transform(id, frame, xform, last_xforms);
            }
            Block::EntitySetTransform { frame, entity, xform } => {
                let Some(id) = entity.checked() else { return };
                self.push_transform(id, frame, xform, last_xforms);
            }
            Block::EntityLog { frame, entity, category, message, color } => {
                let message: String =
                    message.chars().map(|c| if c == '\r' || c == '\n' { ' ' } else { c }).collect();
                self.log_categories.insert(category.clone());
                self.log_colors.insert(color);
                if let Some(id) = entity.checked() {
                    let frames = self.log_frames.entry(id).or_default();
                    if frames.last() != Some(&frame) {
                        frames.push(frame);
                    }
                    if let Some(e) = self.registry.get_mut(&id) {
                        e.has_logs = true;
                        if frame > e.creation_frame {
                            e.has_logs_past_first_frame = true;
                        }
                    }
                }
                self.logs.append(frame, LogEntry { entity: entity.checked(), category, message, color });
            }
            Block::EntityParameter { frame, entity, label, value } => {
                let Some(id) = entity.checked() else { return };
                self.parameter_names.insert(label.clone());
                self.dynamic_params
                    .entry(id)
                    .or_default()
                    .append(frame, (label.clone(), value.clone()));

                // Coalesce: record only actual transitions per (entity, name).
                let changes = self.param_changes.entry(id).or_default().entry(label.clone()).or_default();
                if changes.last().map(|c| c.value.as_str()) != Some(value.as_str()) {
                    let depth = value.split('.').count() - 1;
                    changes.push(DynamicParamEntry { entity: id, name: label, value, frame, depth });
                }
                if let Some(e) = self.registry.get_mut(&id) {
                    e.has_parameters = true;
                }
            }
            Block::EntityValue { frame, entity, label, value } => {
                let Some(id) = entity.checked() else { return };
                self.parameter_names.insert(label.clone());
                self.dynamic_values.entry(id).or_default().append(frame, (label, value));
                if let Some(e) = self.registry.get_mut(&id) {
                    e.has_numeric_parameters = true;
                }
            }
            Block::EntityLine { frame, entity, category, p1, p2, color } => {
                self.push_draw(EntityDrawCommand {
                    entity: entity.checked(),
                    category,
                    shape: DrawShape::Line,
                    color,
                    xform: Transform::from_translation(p1),
                    p2,
                    verts: Vec::new(),
                    radius: 1.0,
                    frame,
                });
            }
            Block::EntityCircle { frame, entity, category, center, up, radius, color } => {
                self.push_draw(EntityDrawCommand {
                    entity: entity.checked(),
                    category,
                    shape: DrawShape::Circle,
                    color,
                    xform: Transform::from_translation(center),
                    p2: up,
                    verts: Vec::new(),
                    radius,
                    frame,
                });
            }
            Block::EntitySphere { frame, entity, category, center, radius, color } => {
                self.push_draw(EntityDrawCommand {
                    entity: entity.checked(),
                    category,
                    shape: DrawShape::Sphere,
                    color,
                    xform: Transform::from_translation(center),
                    p2: Point::ZERO,
                    verts: Vec::new(),
                    radius,
                    frame,
                });
            }
            Block::EntityCapsule { frame, entity, category, p1, p2, radius, color } => {
                self.push_draw(EntityDrawCommand {
                    entity: entity.checked(),
                    category,
                    shape: DrawShape::Capsule,
                    color,
                    xform: Transform::from_translation(p1),
                    p2,
                    verts: Vec::new(),
                    radius,
                    frame,
                });
            }
            Block::EntityMesh { frame, entity, category, verts, color } => {
                if let Some(e) = entity.checked().and_then(|id| self.registry.get_mut(&id)) {
                    e.has_mesh = true;
                }
                self.push_draw(EntityDrawCommand {
                    entity: entity.checked(),
                    category,
                    shape: DrawShape::Mesh,
                    color,
                    xform: Transform::IDENTITY,
                    p2: Point::ZERO,
                    verts,
                    radius: 1.0,
                    frame,
                });
            }
            Block::EntityBox { frame, entity, category, xform, dimensions, color } => {
                self.push_draw(EntityDrawCommand {
                    entity: entity.checked(),
                    category,
                    shape: DrawShape::Box,
                    color,
                    xform,
                    p2: dimensions,
                    verts: Vec::new(),
                    radius: 1.0,
                    frame,
                });
            }
        }
    }

    fn push_transform(
        &mut self,
        id: EntityId,
        frame: FrameIndex,
        xform: Transform,
        last_xforms: &mut HashMap<EntityId, Transform>,
    ) {
        self.transforms.entry(id).or_default().append(frame, xform);
        last_xforms.insert(id, xform);
        if let Some(e) = self.registry.get_mut(&id) {
            e.has_transforms = true;
        }
    }

    fn push_draw(&mut self, command: EntityDrawCommand) {
        self.draw_colors.insert(command.color);
        // Creation draws are an entity's static visual shape, not timed
        // events; keep them out of the filterable category list.
        if !self.qualifies_as_creation_draw(&command) {
            self.draw_categories.insert(command.category.clone());
        }
        if let Some(e) = command.entity.and_then(|id| self.registry.get_mut(&id)) {
            e.has_draws = true;
        }
        self.draws.append(command.frame, command);
    }

    fn qualifies_as_creation_draw(&self, command: &EntityDrawCommand) -> bool {
        if !command.category.is_empty() {
            return false;
        }
        command
            .entity
            .and_then(|id| self.registry.get(&id))
            .is_some_and(|e| command.frame == e.creation_frame || command.frame == e.registration_frame)
    }

    /// Whether a decoded draw is a creation draw: a category-less draw
    /// recorded on the exact frame its entity was (re)defined.
    pub fn is_creation_draw(&self, command: &EntityDrawCommand) -> bool {
        self.qualifies_as_creation_draw(command)
    }

    /// One-time post-decode pass: freeze every series, build the entity
    /// graph from the final registry state and precompute per-entity
    /// creation draw lists.
    fn finalize(&mut self) {
        for series in self.transforms.values_mut() {
            series.freeze();
        }
        for series in self.dynamic_params.values_mut() {
            series.freeze();
        }
        for series in self.dynamic_values.values_mut() {
            series.freeze();
        }
        self.logs.freeze();
        self.draws.freeze();

        self.graph = EntityGraph::new();
        for &id in &self.entity_order {
            let parent = self.registry.get(&id).and_then(|e| e.parent_id);
            self.graph.insert(id, parent);
        }

        for &id in &self.entity_order {
            let Some(e) = self.registry.get(&id) else { continue };
            let mut commands: Vec<EntityDrawCommand> = Vec::new();
            let mut frames = vec![e.creation_frame];
            if e.registration_frame != e.creation_frame {
                frames.push(e.registration_frame);
            }
            for frame in frames {
                for command in self.draws.values_at_exact_frame(frame) {
                    if command.entity == Some(id) && command.category.is_empty() {
                        commands.push(command.clone());
                    }
                }
            }
            if !commands.is_empty() {
                self.creation_draws.insert(id, commands);
            }
        }
    }
}
