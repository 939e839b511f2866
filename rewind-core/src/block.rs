//! The tagged-union block protocol: the exact record types and field
//! layouts the reader and writer must agree on bit-for-bit.
//!
//! Every per-entity record shares a common header of
//! `[tag varint][frame varint][entityId varint]`; `FrameStep` carries only
//! the elapsed time (the frame number is implicit, both sides keep an
//! incrementing counter in lockstep), and `ReplayHeader` has no payload at
//! all. Box draws have their own tag: the value was reserved in the block
//! enum from the start but historic writers mis-emitted boxes under other
//! tags, which made them undecodable; emitting the reserved tag makes the
//! decoder's box path reachable without invalidating any readable file.

use std::collections::HashMap;
use std::io::{Read, Write};

use crate::codec;
use crate::entity::EntityId;
use crate::types::{Color, FrameIndex, Point, Transform};
use crate::{Error, Result};

/// Wire tag values. Zero is reserved/invalid; 0xFF is the header sentinel
/// also used for uncompressed-format auto-detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum BlockType {
    FrameStep = 1,
    EntityDef = 2,
    EntityUndef = 3,
    EntitySetPos = 4,
    EntitySetTransform = 5,
    EntityLog = 6,
    EntityParameter = 7,
    EntityValue = 8,
    EntityLine = 9,
    EntityCircle = 10,
    EntitySphere = 11,
    EntityCapsule = 12,
    EntityMesh = 13,
    EntityBox = 14,
    EntityDefWithParent = 15,

    ReplayHeader = 0xFF,
}

impl BlockType {
    /// The header sentinel tag value, compared as a raw int32 against the
    /// first four bytes of a file to detect uncompressed captures.
    pub const HEADER_TAG: i32 = 0xFF;

    pub fn from_tag(tag: i32) -> Option<BlockType> {
        Some(match tag {
            1 => BlockType::FrameStep,
            2 => BlockType::EntityDef,
            3 => BlockType::EntityUndef,
            4 => BlockType::EntitySetPos,
            5 => BlockType::EntitySetTransform,
            6 => BlockType::EntityLog,
            7 => BlockType::EntityParameter,
            8 => BlockType::EntityValue,
            9 => BlockType::EntityLine,
            10 => BlockType::EntityCircle,
            11 => BlockType::EntitySphere,
            12 => BlockType::EntityCapsule,
            13 => BlockType::EntityMesh,
            14 => BlockType::EntityBox,
            15 => BlockType::EntityDefWithParent,
            0xFF => BlockType::ReplayHeader,
            _ => return None,
        })
    }

    pub fn tag(self) -> i32 {
        self as i32
    }
}

/// Payload of an entity definition record.
///
/// The id is duplicated on the wire (it also appears in the record
/// header); decode trusts the header id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityDef {
    pub name: String,
    pub path: String,
    pub type_name: String,
    pub category_name: String,
    pub initial_transform: Transform,
    pub static_parameters: HashMap<String, String>,
    pub creation_frame: FrameIndex,
}

impl EntityDef {
    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let _id = codec::read_varint(reader)?;
        Ok(Self {
            name: codec::read_string(reader)?,
            path: codec::read_string(reader)?,
            type_name: codec::read_string(reader)?,
            category_name: codec::read_string(reader)?,
            initial_transform: codec::read_transform(reader)?,
            static_parameters: codec::read_string_map(reader)?,
            creation_frame: codec::read_varint(reader)?,
        })
    }

    fn write<W: Write>(&self, writer: &mut W, id: EntityId) -> Result<()> {
        codec::write_varint(writer, id.0 as i32)?;
        codec::write_string(writer, &self.name)?;
        codec::write_string(writer, &self.path)?;
        codec::write_string(writer, &self.type_name)?;
        codec::write_string(writer, &self.category_name)?;
        codec::write_transform(writer, &self.initial_transform)?;
        codec::write_string_map(writer, &self.static_parameters)?;
        codec::write_varint(writer, self.creation_frame)
    }
}

/// One decoded wire record.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Empty sentinel record at the start of every capture.
    ReplayHeader,
    /// Frame boundary carrying the total elapsed time in seconds.
    FrameStep { total_time: f32 },
    EntityDef {
        frame: FrameIndex,
        entity: EntityId,
        /// Present only for the `EntityDefWithParent` wire variant.
        parent: Option<EntityId>,
        def: EntityDef,
    },
    EntityUndef {
        frame: FrameIndex,
        entity: EntityId,
    },
    EntitySetPos {
        frame: FrameIndex,
        entity: EntityId,
        pos: Point,
    },
    EntitySetTransform {
        frame: FrameIndex,
        entity: EntityId,
        xform: Transform,
    },
    EntityLog {
        frame: FrameIndex,
        entity: EntityId,
        category: String,
        message: String,
        color: Color,
    },
    EntityParameter {
        frame: FrameIndex,
        entity: EntityId,
        label: String,
        value: String,
    },
    EntityValue {
        frame: FrameIndex,
        entity: EntityId,
        label: String,
        value: f32,
    },
    EntityLine {
        frame: FrameIndex,
        entity: EntityId,
        category: String,
        p1: Point,
        p2: Point,
        color: Color,
    },
    EntityCircle {
        frame: FrameIndex,
        entity: EntityId,
        category: String,
        center: Point,
        up: Point,
        radius: f32,
        color: Color,
    },
    EntitySphere {
        frame: FrameIndex,
        entity: EntityId,
        category: String,
        center: Point,
        radius: f32,
        color: Color,
    },
    EntityCapsule {
        frame: FrameIndex,
        entity: EntityId,
        category: String,
        p1: Point,
        p2: Point,
        radius: f32,
        color: Color,
    },
    EntityMesh {
        frame: FrameIndex,
        entity: EntityId,
        category: String,
        verts: Vec<Point>,
        color: Color,
    },
    EntityBox {
        frame: FrameIndex,
        entity: EntityId,
        category: String,
        xform: Transform,
        dimensions: Point,
        color: Color,
    },
}

impl Block {
    /// Reads the next record from the stream.
    ///
    /// An unrecognized or zero tag is a fatal [`Error::InvalidBlockTag`]:
    /// the stream is corrupt or not a capture at all. Running out of bytes
    /// anywhere surfaces an EOF-classified IO error, the normal
    /// end-of-capture condition.
    pub fn read<R: Read>(reader: &mut R) -> Result<Block> {
        let tag = codec::read_varint(reader)?;
        let block_type = BlockType::from_tag(tag).ok_or(Error::InvalidBlockTag(tag))?;

        if block_type == BlockType::ReplayHeader {
            return Ok(Block::ReplayHeader);
        }
        if block_type == BlockType::FrameStep {
            return Ok(Block::FrameStep { total_time: codec::read_f32(reader)? });
        }

        let frame = codec::read_varint(reader)?;
        let entity = EntityId(codec::read_varint(reader)? as u32);

        Ok(match block_type {
            BlockType::EntityDef => Block::EntityDef {
                frame,
                entity,
                parent: None,
                def: EntityDef::read(reader)?,
            },
            BlockType::EntityDefWithParent => {
                let parent = EntityId(codec::read_varint(reader)? as u32);
                Block::EntityDef {
                    frame,
                    entity,
                    parent: parent.checked(),
                    def: EntityDef::read(reader)?,
                }
            }
            BlockType::EntityUndef => Block::EntityUndef { frame, entity },
            BlockType::EntitySetPos => Block::EntitySetPos {
                frame,
                entity,
                pos: codec::read_point(reader)?,
            },
            BlockType::EntitySetTransform => Block::EntitySetTransform {
                frame,
                entity,
                xform: codec::read_transform(reader)?,
            },
            BlockType::EntityLog => Block::EntityLog {
                frame,
                entity,
                category: codec::read_string(reader)?,
                message: codec::read_string(reader)?,
                color: codec::read_color(reader)?,
            },
            BlockType::EntityParameter => Block::EntityParameter {
                frame,
                entity,
                label: codec::read_string(reader)?,
                value: codec::read_string(reader)?,
            },
            BlockType::EntityValue => Block::EntityValue {
                frame,
                entity,
                label: codec::read_string(reader)?,
                value: codec::read_f32(reader)?,
            },
            BlockType::EntityLine => Block::EntityLine {
                frame,
                entity,
                category: codec::read_string(reader)?,
                p1: codec::read_point(reader)?,
                p2: codec::read_point(reader)?,
                color: codec::read_color(reader)?,
            },
            BlockType::EntityCircle => Block::EntityCircle {
                frame,
                entity,
                category: codec::read_string(reader)?,
                center: codec::read_point(reader)?,
                up: codec::read_point(reader)?,
                radius: codec::read_f32(reader)?,
                color: codec::read_color(reader)?,
            },
            BlockType::EntitySphere => Block::EntitySphere {
                frame,
                entity,
                category: codec::read_string(reader)?,
                center: codec::read_point(reader)?,
                radius: codec::read_f32(reader)?,
                color: codec::read_color(reader)?,
            },
            BlockType::EntityCapsule => Block::EntityCapsule {
                frame,
                entity,
                category: codec::read_string(reader)?,
                p1: codec::read_point(reader)?,
                p2: codec::read_point(reader)?,
                radius: codec::read_f32(reader)?,
                color: codec::read_color(reader)?,
            },
            BlockType::EntityMesh => {
                let category = codec::read_string(reader)?;
                // Vertex count is a plain 4-byte int, not a varint.
                let count = codec::read_i32(reader)?.max(0) as usize;
                let mut verts = Vec::with_capacity(count.min(1 << 20));
                for _ in 0..count {
                    verts.push(codec::read_point(reader)?);
                }
                Block::EntityMesh {
                    frame,
                    entity,
                    category,
                    verts,
                    color: codec::read_color(reader)?,
                }
            }
            BlockType::EntityBox => Block::EntityBox {
                frame,
                entity,
                category: codec::read_string(reader)?,
                xform: codec::read_transform(reader)?,
                dimensions: codec::read_point(reader)?,
                color: codec::read_color(reader)?,
            },
            BlockType::FrameStep | BlockType::ReplayHeader => unreachable!(),
        })
    }

    /// Writes this record to the stream.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Block::ReplayHeader => codec::write_varint(writer, BlockType::ReplayHeader.tag()),
            Block::FrameStep { total_time } => {
                codec::write_varint(writer, BlockType::FrameStep.tag())?;
                codec::write_f32(writer, *total_time)
            }
            Block::EntityDef { frame, entity, parent, def } => {
                let tag = match parent {
                    Some(_) => BlockType::EntityDefWithParent,
                    None => BlockType::EntityDef,
                };
                write_entity_header(writer, tag, *frame, *entity)?;
                if let Some(parent) = parent {
                    codec::write_varint(writer, parent.0 as i32)?;
                }
                def.write(writer, *entity)
            }
            Block::EntityUndef { frame, entity } => {
                write_entity_header(writer, BlockType::EntityUndef, *frame, *entity)
            }
            Block::EntitySetPos { frame, entity, pos } => {
                write_entity_header(writer, BlockType::EntitySetPos, *frame, *entity)?;
                codec::write_point(writer, pos)
            }
            Block::EntitySetTransform { frame, entity, xform } => {
                write_entity_header(writer, BlockType::EntitySetTransform, *frame, *entity)?;
                codec::write_transform(writer, xform)
            }
            Block::EntityLog { frame, entity, category, message, color } => {
                write_entity_header(writer, BlockType::EntityLog, *frame, *entity)?;
                codec::write_string(writer, category)?;
                codec::write_string(writer, message)?;
                codec::write_color(writer, *color)
            }
            Block::EntityParameter { frame, entity, label, value } => {
                write_entity_header(writer, BlockType::EntityParameter, *frame, *entity)?;
                codec::write_string(writer, label)?;
                codec::write_string(writer, value)
            }
            Block::EntityValue { frame, entity, label, value } => {
                write_entity_header(writer, BlockType::EntityValue, *frame, *entity)?;
                codec::write_string(writer, label)?;
                codec::write_f32(writer, *value)
            }
            Block::EntityLine { frame, entity, category, p1, p2, color } => {
                write_entity_header(writer, BlockType::EntityLine, *frame, *entity)?;
                codec::write_string(writer, category)?;
                codec::write_point(writer, p1)?;
                codec::write_point(writer, p2)?;
                codec::write_color(writer, *color)
            }
            Block::EntityCircle { frame, entity, category, center, up, radius, color } => {
                write_entity_header(writer, BlockType::EntityCircle, *frame, *entity)?;
                codec::write_string(writer, category)?;
                codec::write_point(writer, center)?;
                codec::write_point(writer, up)?;
                codec::write_f32(writer, *radius)?;
                codec::write_color(writer, *color)
            }
            Block::EntitySphere { frame, entity, category, center, radius, color } => {
                write_entity_header(writer, BlockType::EntitySphere, *frame, *entity)?;
                codec::write_string(writer, category)?;
                codec::write_point(writer, center)?;
                codec::write_f32(writer, *radius)?;
                codec::write_color(writer, *color)
            }
            Block::EntityCapsule { frame, entity, category, p1, p2, radius, color } => {
                write_entity_header(writer, BlockType::EntityCapsule, *frame, *entity)?;
                codec::write_string(writer, category)?;
                codec::write_point(writer, p1)?;
                codec::write_point(writer, p2)?;
                codec::write_f32(writer, *radius)?;
                codec::write_color(writer, *color)
            }
            Block::EntityMesh { frame, entity, category, verts, color } => {
                write_entity_header(writer, BlockType::EntityMesh, *frame, *entity)?;
                codec::write_string(writer, category)?;
                codec::write_i32(writer, verts.len() as i32)?;
                for vert in verts {
                    codec::write_point(writer, vert)?;
                }
                codec::write_color(writer, *color)
            }
            Block::EntityBox { frame, entity, category, xform, dimensions, color } => {
                write_entity_header(writer, BlockType::EntityBox, *frame, *entity)?;
                codec::write_string(writer, category)?;
                codec::write_transform(writer, xform)?;
                codec::write_point(writer, dimensions)?;
                codec::write_color(writer, *color)
            }
        }
    }
}

fn write_entity_header<W: Write>(
    writer: &mut W,
    block_type: BlockType,
    frame: FrameIndex,
    entity: EntityId,
) -> Result<()> {
    codec::write_varint(writer, block_type.tag())?;
    codec::write_varint(writer, frame)?;
    codec::write_varint(writer, entity.0 as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(block: Block) -> Vec<u8> {
        let mut buf = Vec::new();
        block.write(&mut buf).unwrap();
        let read = Block::read(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(read, block);
        buf
    }

    #[test]
    fn test_header_and_frame_step_roundtrip() {
        // 0xFF varint-encodes to two bytes.
        assert_eq!(roundtrip(Block::ReplayHeader), [0xFF, 0x01]);
        assert_eq!(roundtrip(Block::FrameStep { total_time: 0.033 }).len(), 5);
    }

    #[test]
    fn test_entity_def_roundtrip() {
        let mut static_parameters = HashMap::new();
        static_parameters.insert("team".to_string(), "red".to_string());
        roundtrip(Block::EntityDef {
            frame: 3,
            entity: EntityId(1),
            parent: None,
            def: EntityDef {
                name: "npc".to_string(),
                path: "world/npc".to_string(),
                type_name: "Character".to_string(),
                category_name: "AI".to_string(),
                initial_transform: Transform::from_translation(Point::new(1.0, 2.0, 3.0)),
                static_parameters,
                creation_frame: 3,
            },
        });
    }

    #[test]
    fn test_entity_def_with_parent_uses_own_tag() {
        let buf = {
            let mut buf = Vec::new();
            Block::EntityDef {
                frame: 0,
                entity: EntityId(2),
                parent: Some(EntityId(1)),
                def: EntityDef::default(),
            }
            .write(&mut buf)
            .unwrap();
            buf
        };
        assert_eq!(buf[0] as i32, BlockType::EntityDefWithParent.tag());
        let read = Block::read(&mut Cursor::new(&buf)).unwrap();
        assert!(matches!(read, Block::EntityDef { parent: Some(EntityId(1)), .. }));
    }

    #[test]
    fn test_draw_records_roundtrip() {
        roundtrip(Block::EntityLine {
            frame: 7,
            entity: EntityId(1),
            category: "debug".to_string(),
            p1: Point::new(0.0, 0.0, 0.0),
            p2: Point::new(1.0, 1.0, 1.0),
            color: Color::Lime,
        });
        roundtrip(Block::EntityCircle {
            frame: 7,
            entity: EntityId(1),
            category: String::new(),
            center: Point::ZERO,
            up: Point::new(0.0, 1.0, 0.0),
            radius: 2.5,
            color: Color::Cyan,
        });
        roundtrip(Block::EntitySphere {
            frame: 8,
            entity: EntityId::GLOBAL,
            category: "hits".to_string(),
            center: Point::new(4.0, 5.0, 6.0),
            radius: 0.5,
            color: Color::Red,
        });
        roundtrip(Block::EntityCapsule {
            frame: 8,
            entity: EntityId(2),
            category: String::new(),
            p1: Point::ZERO,
            p2: Point::new(0.0, 2.0, 0.0),
            radius: 0.3,
            color: Color::Orange,
        });
        roundtrip(Block::EntityMesh {
            frame: 0,
            entity: EntityId(2),
            category: String::new(),
            verts: vec![Point::ZERO, Point::new(1.0, 0.0, 0.0), Point::new(0.0, 1.0, 0.0)],
            color: Color::White,
        });
    }

    #[test]
    fn test_box_has_its_own_tag() {
        let block = Block::EntityBox {
            frame: 1,
            entity: EntityId(1),
            category: "volumes".to_string(),
            xform: Transform::IDENTITY,
            dimensions: Point::new(1.0, 2.0, 3.0),
            color: Color::Yellow,
        };
        let buf = roundtrip(block);
        assert_eq!(buf[0] as i32, BlockType::EntityBox.tag());
        assert_ne!(buf[0] as i32, BlockType::EntityMesh.tag());
    }

    #[test]
    fn test_invalid_tag_is_fatal() {
        let err = Block::read(&mut Cursor::new(vec![0u8])).unwrap_err();
        assert!(matches!(err, Error::InvalidBlockTag(0)));
        let err = Block::read(&mut Cursor::new(vec![42u8])).unwrap_err();
        assert!(matches!(err, Error::InvalidBlockTag(42)));
    }

    #[test]
    fn test_truncated_record_is_eof() {
        let mut buf = Vec::new();
        Block::EntitySetPos {
            frame: 1,
            entity: EntityId(1),
            pos: Point::new(1.0, 2.0, 3.0),
        }
        .write(&mut buf)
        .unwrap();
        buf.truncate(buf.len() - 4);
        assert!(Block::read(&mut Cursor::new(buf)).unwrap_err().is_eof());
    }
}
