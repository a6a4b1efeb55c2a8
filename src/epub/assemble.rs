//! Section assembly: walk the navigation tree, cut each section out of its
//! file and reconcile the result with the reading order.
//!
//! A section's extent is only known once the next navigation point is seen,
//! so each content reference reserves an output slot and is chopped one step
//! later. Spine files the navigation skips are chopped whole into the slot
//! of the section they follow, with a warning, so that every file of the
//! reading order ends up in the output exactly once.

use std::collections::{HashMap, HashSet};

use crate::archive::Archive;
use crate::diagnostics::{Diagnostics, comment, escape_attr};
use crate::epub::EpubOptions;
use crate::epub::chop::Chopper;
use crate::epub::navigation::{FileRef, NavNode};
use crate::epub::package::SpineItem;
use crate::error::{Error, Result};
use crate::repair::HtmlRepair;

/// Lifecycle of one assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// Nothing emitted yet.
    Empty,
    /// Walking the navigation tree.
    Assembling,
    /// Output complete.
    Closed,
}

/// Sections of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    /// Section markers and chopped fragments, in reading order.
    pub html: String,
    pub warnings: Vec<String>,
    pub state: AssemblerState,
}

/// Position of the walk between two content references.
#[derive(Debug, Clone, Default)]
struct Cursor {
    /// Pending reference, chopped when the next one is known.
    last: Option<FileRef>,
    /// Output slot reserved for the pending reference.
    slot: Option<usize>,
    /// Spine index of the latest reference found in the spine.
    spine_pos: Option<usize>,
}

/// Builds the section sequence of one EPUB.
pub struct SectionAssembler<'a> {
    spine: &'a [SpineItem],
    spine_index: HashMap<&'a str, usize>,
    chopper: Chopper<'a>,
    options: &'a EpubOptions,
    out: Vec<String>,
    cursor: Cursor,
    visited: HashSet<String>,
    /// Filenames the navigation points to; never gap-filled.
    referenced: HashSet<String>,
    diagnostics: Diagnostics,
    state: AssemblerState,
}

impl<'a> SectionAssembler<'a> {
    pub fn new(
        archive: &'a dyn Archive,
        repair: &'a dyn HtmlRepair,
        spine: &'a [SpineItem],
        options: &'a EpubOptions,
    ) -> Self {
        let mut spine_index = HashMap::with_capacity(spine.len());
        for (i, item) in spine.iter().enumerate() {
            spine_index.entry(item.filename.as_str()).or_insert(i);
        }
        Self {
            spine,
            spine_index,
            chopper: Chopper::new(archive, repair).with_options(options.repair),
            options,
            out: Vec::new(),
            cursor: Cursor::default(),
            visited: HashSet::new(),
            referenced: HashSet::new(),
            diagnostics: Diagnostics::new(),
            state: AssemblerState::Empty,
        }
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Assemble sections following the navigation tree rooted at `root`.
    ///
    /// A tree without any content reference is unusable; the reading order
    /// is emitted flat instead.
    pub fn assemble(mut self, root: &NavNode) -> Result<Assembly> {
        if root.content_count() == 0 {
            return self.linear("navigation has no content reference, reading order used instead");
        }

        self.referenced = root
            .content_refs()
            .into_iter()
            .map(|r| r.filename().to_string())
            .collect();

        // Prelude: spine files preceding the first section
        self.out.push(String::new());
        self.state = AssemblerState::Assembling;
        self.visit(root);
        self.finish();
        Ok(self.close())
    }

    /// Emit the whole spine as gap-filled chops, after a document-level
    /// warning giving `reason`.
    pub fn linear(mut self, reason: &str) -> Result<Assembly> {
        if self.spine.is_empty() {
            return Err(Error::NothingToAssemble);
        }
        self.state = AssemblerState::Assembling;
        self.diagnostics.warn(reason);
        let mut text = comment(reason);
        for index in 0..self.spine.len() {
            let to = self.spine_ref(index + 1);
            text.push_str(&self.gap_fill(index, to.as_ref()));
        }
        self.out.push(text);
        Ok(self.close())
    }

    fn close(mut self) -> Assembly {
        self.state = AssemblerState::Closed;
        Assembly {
            html: self.out.concat(),
            warnings: self.diagnostics.into_messages(),
            state: self.state,
        }
    }

    fn visit(&mut self, node: &NavNode) {
        let labelled = !node.is_root();
        if labelled {
            self.out.push(format!(
                "{}<section class=\"{}\" title=\"{}\">\n",
                indent(node.depth),
                escape_attr(&self.options.section_class),
                escape_attr(&node.title)
            ));
        }
        if let Some(content) = &node.content {
            self.reference(content);
        }
        for child in &node.children {
            self.visit(child);
        }
        if labelled {
            self.out.push(format!("{}</section>\n", indent(node.depth)));
        }
    }

    /// Handle one content reference: materialize the pending one and
    /// reserve a slot for this one.
    ///
    /// A whole-file reference to a file already in the output adds nothing.
    fn reference(&mut self, current: &FileRef) {
        if current.anchor.is_none() && self.visited.contains(current.filename()) {
            let message = format!("{}: already included, section left empty", current.filename());
            self.diagnostics.warn(message.as_str());
            self.out.push(comment(&message));
            return;
        }

        let current_pos = self.spine_index.get(current.filename()).copied();

        // First reference found in the spine: fill the prelude
        if self.cursor.spine_pos.is_none()
            && let Some(pos) = current_pos
        {
            self.out[0] = self.prelude(pos, current);
        }

        if let Some(last) = self.cursor.last.take() {
            let mut text = String::new();
            let gaps = if last.file != current.file {
                self.gaps_between(self.cursor.spine_pos, current_pos)
            } else {
                Vec::new()
            };

            let first_to = gaps
                .first()
                .and_then(|&i| self.spine_ref(i))
                .unwrap_or_else(|| current.clone());
            text.push_str(&self.chop(&last, Some(&first_to)));

            for (n, &index) in gaps.iter().enumerate() {
                let to = gaps
                    .get(n + 1)
                    .and_then(|&i| self.spine_ref(i))
                    .unwrap_or_else(|| current.clone());
                text.push_str(&self.gap_fill(index, Some(&to)));
            }

            if let Some(slot) = self.cursor.slot {
                self.out[slot] = text;
            }
        }

        self.visited.insert(current.filename().to_string());
        self.out.push(String::new());
        self.cursor = Cursor {
            last: Some(current.clone()),
            slot: Some(self.out.len() - 1),
            spine_pos: current_pos.or(self.cursor.spine_pos),
        };
    }

    /// Spine files before the first referenced one, boilerplate and files
    /// with a section of their own excluded.
    fn prelude(&mut self, first_pos: usize, first: &FileRef) -> String {
        let spine = self.spine;
        let mut text = String::new();
        let kept: Vec<usize> = (0..first_pos)
            .filter(|&i| {
                let filename = &spine[i].filename;
                if self.referenced.contains(filename) {
                    false
                } else if self.options.is_boilerplate(filename) {
                    tracing::debug!("{filename}: boilerplate before first section, skipped");
                    text.push_str(&comment(&format!(
                        "{filename}: boilerplate before first section, skipped"
                    )));
                    self.visited.insert(filename.clone());
                    false
                } else {
                    true
                }
            })
            .collect();

        for (n, &index) in kept.iter().enumerate() {
            let to = kept
                .get(n + 1)
                .and_then(|&i| self.spine_ref(i))
                .unwrap_or_else(|| first.clone());
            text.push_str(&self.gap_fill(index, Some(&to)));
        }
        text
    }

    /// Materialize the last reference and sweep up unvisited spine files.
    fn finish(&mut self) {
        let Some(last) = self.cursor.last.take() else {
            return;
        };
        let mut text = String::new();
        let tail: Vec<usize> = (0..self.spine.len())
            .filter(|&i| !self.visited.contains(&self.spine[i].filename))
            .collect();

        let first_to = tail.first().and_then(|&i| self.spine_ref(i));
        text.push_str(&self.chop(&last, first_to.as_ref()));
        for (n, &index) in tail.iter().enumerate() {
            let to = tail.get(n + 1).and_then(|&i| self.spine_ref(i));
            text.push_str(&self.gap_fill(index, to.as_ref()));
        }

        if let Some(slot) = self.cursor.slot.take() {
            self.out[slot] = text;
        }
    }

    /// Unvisited spine indexes strictly between two spine positions.
    fn gaps_between(&self, previous: Option<usize>, current: Option<usize>) -> Vec<usize> {
        match (previous, current) {
            (Some(previous), Some(current)) if current > previous + 1 => (previous + 1..current)
                .filter(|&i| {
                    let filename = &self.spine[i].filename;
                    !self.visited.contains(filename) && !self.referenced.contains(filename)
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn spine_ref(&self, index: usize) -> Option<FileRef> {
        self.spine
            .get(index)
            .map(|item| FileRef::new(item.path.as_str(), None))
    }

    fn chop(&mut self, from: &FileRef, to: Option<&FileRef>) -> String {
        let result = self.chopper.chop(from, to);
        self.diagnostics.extend(result.warnings.iter().cloned());
        result.render()
    }

    /// Chop a whole spine file absent from the navigation.
    fn gap_fill(&mut self, index: usize, to: Option<&FileRef>) -> String {
        let spine = self.spine;
        let item = &spine[index];
        self.visited.insert(item.filename.clone());

        let message = format!("{}: not in navigation, inserted from reading order", item.filename);
        self.diagnostics.warn(message.as_str());
        let mut text = comment(&message);
        text.push_str(&self.chop(&FileRef::new(item.path.as_str(), None), to));
        text
    }
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth.saturating_sub(1))
}
