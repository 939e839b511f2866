//! The capture writer: handle mapping, change coalescing and block
//! emission.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use flate2::write::DeflateEncoder;
use flate2::Compression;
use rewind_core::block::{Block, EntityDef};
use rewind_core::entity::EntityId;
use rewind_core::types::{Color, FrameIndex, Point, Transform};

use crate::{Error, Result};

/// Writes a replay capture as a deflate-compressed block stream.
///
/// Entities are keyed by opaque caller-supplied `u64` handles; referencing
/// a handle that was never registered auto-creates a minimal entity rather
/// than failing. Frame numbering is implicit: every [`Self::step_frame`]
/// advances the writer's counter, and the decoder keeps its own counter in
/// lockstep.
///
/// The underlying stream must be closed exactly once via
/// [`Self::finish`]; dropping the writer without finishing may truncate
/// the compressed tail.
pub struct ReplayWriter<W: Write> {
    out: DeflateEncoder<W>,
    frame: FrameIndex,
    next_id: u32,
    handles: HashMap<u64, EntityId>,
    last_transforms: HashMap<EntityId, Transform>,
    last_values: HashMap<EntityId, HashMap<String, f32>>,
}

impl ReplayWriter<BufWriter<File>> {
    /// Creates a capture file and writes the stream header.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> ReplayWriter<W> {
    /// Wraps a sink in the capture compressor and writes the stream
    /// header.
    pub fn new(sink: W) -> Result<Self> {
        let mut out = DeflateEncoder::new(sink, Compression::fast());
        Block::ReplayHeader.write(&mut out)?;
        Ok(Self {
            out,
            frame: 0,
            next_id: 0,
            handles: HashMap::new(),
            last_transforms: HashMap::new(),
            last_values: HashMap::new(),
        })
    }

    /// Flushes and closes the compressed stream, returning the sink.
    pub fn finish(self) -> Result<W> {
        Ok(self.out.finish()?)
    }

    /// Emits a frame boundary carrying the total elapsed time and advances
    /// the implicit frame counter.
    pub fn step_frame(&mut self, total_time: f32) -> Result<()> {
        Block::FrameStep { total_time }.write(&mut self.out)?;
        self.frame += 1;
        Ok(())
    }

    /// Registers (or redefines) the entity behind `handle`.
    #[allow(clippy::too_many_arguments)]
    pub fn register_entity(
        &mut self,
        handle: u64,
        name: &str,
        path: &str,
        type_name: &str,
        category_name: &str,
        initial_transform: Transform,
        static_parameters: HashMap<String, String>,
    ) -> Result<EntityId> {
        self.register(
            handle,
            name,
            path,
            type_name,
            category_name,
            initial_transform,
            static_parameters,
            None,
        )
    }

    /// Registers an entity as a child of the entity behind
    /// `parent_handle`. The parent is auto-created when unmapped, so
    /// children may be registered first.
    #[allow(clippy::too_many_arguments)]
    pub fn register_entity_with_parent(
        &mut self,
        handle: u64,
        parent_handle: u64,
        name: &str,
        path: &str,
        type_name: &str,
        category_name: &str,
        initial_transform: Transform,
        static_parameters: HashMap<String, String>,
    ) -> Result<EntityId> {
        let parent = self.entity(parent_handle)?;
        self.register(
            handle,
            name,
            path,
            type_name,
            category_name,
            initial_transform,
            static_parameters,
            Some(parent),
        )
    }

    /// Closes the entity's lifetime at the current frame and releases its
    /// handle.
    pub fn unregister_entity(&mut self, handle: u64) -> Result<()> {
        let entity = self.entity(handle)?;
        Block::EntityUndef { frame: self.frame, entity }.write(&mut self.out)?;
        self.handles.remove(&handle);
        self.last_transforms.remove(&entity);
        self.last_values.remove(&entity);
        Ok(())
    }

    /// Records the entity's position. Writes a record only when the
    /// position differs from the last written value.
    pub fn set_position(&mut self, handle: u64, pos: Point) -> Result<()> {
        let entity = self.entity(handle)?;
        let last = self.last_transforms.get(&entity);
        if last.is_some_and(|xform| xform.translation == pos) {
            return Ok(());
        }
        let mut xform = last.copied().unwrap_or(Transform::IDENTITY);
        xform.translation = pos;
        self.last_transforms.insert(entity, xform);
        Block::EntitySetPos { frame: self.frame, entity, pos }.write(&mut self.out)?;
        Ok(())
    }

    /// Records the entity's full transform, deduplicated against the last
    /// written value.
    pub fn set_transform(&mut self, handle: u64, xform: Transform) -> Result<()> {
        let entity = self.entity(handle)?;
        if self.last_transforms.get(&entity) == Some(&xform) {
            return Ok(());
        }
        self.last_transforms.insert(entity, xform);
        Block::EntitySetTransform { frame: self.frame, entity, xform }.write(&mut self.out)?;
        Ok(())
    }

    /// Records a log line. Never deduplicated.
    pub fn set_log(&mut self, handle: u64, category: &str, message: &str, color: Color) -> Result<()> {
        let entity = self.entity(handle)?;
        Block::EntityLog {
            frame: self.frame,
            entity,
            category: category.to_string(),
            message: message.to_string(),
            color,
        }
        .write(&mut self.out)?;
        Ok(())
    }

    /// Records a string-valued dynamic parameter. Every call produces a
    /// record; the reader coalesces repeats itself.
    pub fn set_dynamic_param(&mut self, handle: u64, key: &str, value: &str) -> Result<()> {
        let entity = self.entity(handle)?;
        Block::EntityParameter {
            frame: self.frame,
            entity,
            label: key.to_string(),
            value: value.to_string(),
        }
        .write(&mut self.out)?;
        Ok(())
    }

    /// Records a numeric dynamic parameter, deduplicated per (entity, key)
    /// against the last written value.
    pub fn set_dynamic_value(&mut self, handle: u64, key: &str, value: f32) -> Result<()> {
        let entity = self.entity(handle)?;
        let params = self.last_values.entry(entity).or_default();
        if params.get(key) == Some(&value) {
            return Ok(());
        }
        params.insert(key.to_string(), value);
        Block::EntityValue {
            frame: self.frame,
            entity,
            label: key.to_string(),
            value,
        }
        .write(&mut self.out)?;
        Ok(())
    }

    pub fn draw_line(&mut self, handle: u64, category: &str, p1: Point, p2: Point, color: Color) -> Result<()> {
        let entity = self.entity(handle)?;
        Block::EntityLine {
            frame: self.frame,
            entity,
            category: category.to_string(),
            p1,
            p2,
            color,
        }
        .write(&mut self.out)?;
        Ok(())
    }

    pub fn draw_circle(
        &mut self,
        handle: u64,
        category: &str,
        center: Point,
        up: Point,
        radius: f32,
        color: Color,
    ) -> Result<()> {
        let entity = self.entity(handle)?;
        Block::EntityCircle {
            frame: self.frame,
            entity,
            category: category.to_string(),
            center,
            up,
            radius,
            color,
        }
        .write(&mut self.out)?;
        Ok(())
    }

    pub fn draw_sphere(&mut self, handle: u64, category: &str, center: Point, radius: f32, color: Color) -> Result<()> {
        let entity = self.entity(handle)?;
        Block::EntitySphere {
            frame: self.frame,
            entity,
            category: category.to_string(),
            center,
            radius,
            color,
        }
        .write(&mut self.out)?;
        Ok(())
    }

    pub fn draw_box(
        &mut self,
        handle: u64,
        category: &str,
        xform: Transform,
        dimensions: Point,
        color: Color,
    ) -> Result<()> {
        let entity = self.entity(handle)?;
        Block::EntityBox {
            frame: self.frame,
            entity,
            category: category.to_string(),
            xform,
            dimensions,
            color,
        }
        .write(&mut self.out)?;
        Ok(())
    }

    pub fn draw_capsule(
        &mut self,
        handle: u64,
        category: &str,
        p1: Point,
        p2: Point,
        radius: f32,
        color: Color,
    ) -> Result<()> {
        let entity = self.entity(handle)?;
        Block::EntityCapsule {
            frame: self.frame,
            entity,
            category: category.to_string(),
            p1,
            p2,
            radius,
            color,
        }
        .write(&mut self.out)?;
        Ok(())
    }

    /// Records a mesh draw. Meshes are creation draws only, never timeline
    /// events; a non-empty category is a caller error.
    pub fn draw_mesh(&mut self, handle: u64, category: &str, verts: &[Point], color: Color) -> Result<()> {
        if !category.is_empty() {
            return Err(Error::MeshWithCategory);
        }
        let entity = self.entity(handle)?;
        Block::EntityMesh {
            frame: self.frame,
            entity,
            category: String::new(),
            verts: verts.to_vec(),
            color,
        }
        .write(&mut self.out)?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn register(
        &mut self,
        handle: u64,
        name: &str,
        path: &str,
        type_name: &str,
        category_name: &str,
        initial_transform: Transform,
        static_parameters: HashMap<String, String>,
        parent: Option<EntityId>,
    ) -> Result<EntityId> {
        let entity = match self.handles.get(&handle) {
            Some(&id) => id, // redefinition keeps the id stable
            None => {
                self.next_id += 1;
                let id = EntityId(self.next_id);
                self.handles.insert(handle, id);
                id
            }
        };
        Block::EntityDef {
            frame: self.frame,
            entity,
            parent,
            def: EntityDef {
                name: name.to_string(),
                path: path.to_string(),
                type_name: type_name.to_string(),
                category_name: category_name.to_string(),
                initial_transform,
                static_parameters,
                creation_frame: self.frame,
            },
        }
        .write(&mut self.out)?;
        Ok(entity)
    }

    /// Resolves a handle, auto-registering a minimal entity on first
    /// reference. Referencing an unregistered handle is an ergonomic
    /// auto-create, not an error.
    fn entity(&mut self, handle: u64) -> Result<EntityId> {
        if let Some(&id) = self.handles.get(&handle) {
            return Ok(id);
        }
        let name = handle.to_string();
        self.register(handle, &name, &name, "Auto", "None", Transform::IDENTITY, HashMap::new(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::DeflateDecoder;
    use std::io::Cursor;

    fn decode_blocks(bytes: &[u8]) -> Vec<Block> {
        let mut stream = DeflateDecoder::new(Cursor::new(bytes));
        let mut blocks = Vec::new();
        loop {
            match Block::read(&mut stream) {
                Ok(block) => blocks.push(block),
                Err(e) if e.is_eof() => break,
                Err(e) => panic!("unexpected decode error: {e}"),
            }
        }
        blocks
    }

    #[test]
    fn test_stream_starts_with_header() {
        let writer = ReplayWriter::new(Vec::new()).unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(decode_blocks(&bytes), vec![Block::ReplayHeader]);
    }

    #[test]
    fn test_position_dedup() {
        let mut writer = ReplayWriter::new(Vec::new()).unwrap();
        writer.register_entity(1, "e", "e", "T", "C", Transform::IDENTITY, HashMap::new()).unwrap();
        writer.set_position(1, Point::new(1.0, 2.0, 3.0)).unwrap();
        writer.step_frame(0.033).unwrap();
        writer.set_position(1, Point::new(1.0, 2.0, 3.0)).unwrap(); // repeat, dropped
        writer.step_frame(0.066).unwrap();
        writer.set_position(1, Point::new(4.0, 5.0, 6.0)).unwrap();
        let bytes = writer.finish().unwrap();

        let positions = decode_blocks(&bytes)
            .into_iter()
            .filter(|b| matches!(b, Block::EntitySetPos { .. }))
            .count();
        assert_eq!(positions, 2);
    }

    #[test]
    fn test_numeric_param_dedup_is_per_key() {
        let mut writer = ReplayWriter::new(Vec::new()).unwrap();
        writer.set_dynamic_value(1, "health", 1.0).unwrap();
        writer.set_dynamic_value(1, "health", 1.0).unwrap(); // dropped
        writer.set_dynamic_value(1, "armor", 1.0).unwrap(); // different key
        writer.set_dynamic_value(1, "health", 0.5).unwrap();
        let bytes = writer.finish().unwrap();

        let values = decode_blocks(&bytes)
            .into_iter()
            .filter(|b| matches!(b, Block::EntityValue { .. }))
            .count();
        assert_eq!(values, 3);
    }

    #[test]
    fn test_string_params_are_not_deduplicated() {
        let mut writer = ReplayWriter::new(Vec::new()).unwrap();
        writer.set_dynamic_param(1, "state", "a.b").unwrap();
        writer.set_dynamic_param(1, "state", "a.b").unwrap();
        let bytes = writer.finish().unwrap();

        let params = decode_blocks(&bytes)
            .into_iter()
            .filter(|b| matches!(b, Block::EntityParameter { .. }))
            .count();
        assert_eq!(params, 2);
    }

    #[test]
    fn test_auto_register_on_first_reference() {
        let mut writer = ReplayWriter::new(Vec::new()).unwrap();
        writer.set_log(42, "combat", "hit", Color::Red).unwrap();
        let bytes = writer.finish().unwrap();

        let blocks = decode_blocks(&bytes);
        assert!(matches!(&blocks[1], Block::EntityDef { entity: EntityId(1), .. }));
        assert!(matches!(&blocks[2], Block::EntityLog { entity: EntityId(1), .. }));
    }

    #[test]
    fn test_mesh_with_category_is_rejected() {
        let mut writer = ReplayWriter::new(Vec::new()).unwrap();
        let err = writer.draw_mesh(1, "debris", &[Point::ZERO], Color::Gray).unwrap_err();
        assert!(matches!(err, Error::MeshWithCategory));
    }

    #[test]
    fn test_ids_assigned_sequentially_from_one() {
        let mut writer = ReplayWriter::new(Vec::new()).unwrap();
        let a = writer.register_entity(10, "a", "a", "T", "C", Transform::IDENTITY, HashMap::new()).unwrap();
        let b = writer.register_entity(20, "b", "b", "T", "C", Transform::IDENTITY, HashMap::new()).unwrap();
        let a_again = writer.register_entity(10, "a2", "a2", "T", "C", Transform::IDENTITY, HashMap::new()).unwrap();
        assert_eq!(a, EntityId(1));
        assert_eq!(b, EntityId(2));
        assert_eq!(a_again, EntityId(1));
    }
}
