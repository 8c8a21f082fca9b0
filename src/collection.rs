//! Frame-indexed collection of trackable objects.

use std::collections::{BTreeMap, HashMap};

use crate::{Error, ObjectId, Result, TrackableObject};

/// Objects to track, grouped and ordered by frame.
///
/// Ids are unique across the whole collection. Within a frame objects keep
/// their insertion order, which is the row/column order of the cost matrices.
#[derive(Debug, Clone, Default)]
pub struct ObjectCollection {
    frames: BTreeMap<i32, Vec<TrackableObject>>,
    index: HashMap<ObjectId, (i32, usize)>,
}

impl ObjectCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from an iterator of objects.
    pub fn from_objects<I>(objects: I) -> Result<Self>
    where
        I: IntoIterator<Item = TrackableObject>,
    {
        let mut collection = Self::new();
        for obj in objects {
            collection.add(obj)?;
        }
        Ok(collection)
    }

    /// Add an object to its frame.
    ///
    /// Fails with `Error::DuplicateObject` if the id is already present.
    pub fn add(&mut self, object: TrackableObject) -> Result<()> {
        if self.index.contains_key(&object.id) {
            return Err(Error::DuplicateObject(object.id));
        }
        let frame_objects = self.frames.entry(object.frame).or_default();
        self.index.insert(object.id, (object.frame, frame_objects.len()));
        frame_objects.push(object);
        Ok(())
    }

    /// Total number of objects.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the collection holds no object.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Frames holding at least one object, in increasing order.
    pub fn frames(&self) -> impl Iterator<Item = i32> + '_ {
        self.frames.keys().copied()
    }

    /// Number of frames holding objects.
    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    /// Objects of one frame, in insertion order.
    pub fn objects_in(&self, frame: i32) -> &[TrackableObject] {
        self.frames.get(&frame).map_or(&[], Vec::as_slice)
    }

    /// Look up an object by id.
    pub fn get(&self, id: ObjectId) -> Option<&TrackableObject> {
        let &(frame, idx) = self.index.get(&id)?;
        self.frames.get(&frame).and_then(|objs| objs.get(idx))
    }

    /// Iterate over all objects, frame by frame.
    pub fn iter(&self) -> impl Iterator<Item = &TrackableObject> + '_ {
        self.frames.values().flatten()
    }

    /// Consecutive pairs of present frames, in increasing order.
    ///
    /// Frames are not required to be contiguous: a frame index without any
    /// object is skipped, not treated as a break.
    pub fn frame_pairs(&self) -> Vec<(i32, i32)> {
        let frames: Vec<i32> = self.frames().collect();
        frames.windows(2).map(|w| (w[0], w[1])).collect()
    }
}
