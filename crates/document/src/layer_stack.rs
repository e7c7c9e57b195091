use model::{Color, Offset, PixelBuffer};
use slotmap::SlotMap;
use tracing::debug;

use crate::layer::{Layer, LayerContent, LayerKind, TextContent};

slotmap::new_key_type! {
    pub struct LayerId;
}

pub const BACKGROUND_LAYER_NAME: &str = "Background";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    /// Towards the top of the stack (drawn later).
    Up,
    /// Towards the bottom of the stack (drawn earlier).
    Down,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayerStackError {
    #[error("layer index {index} is out of range for {len} layers")]
    InvalidIndex { index: usize, len: usize },
    #[error("layer {index} is locked")]
    LayerLocked { index: usize },
    #[error("layer {index} is a {actual} layer, expected {expected}")]
    KindMismatch {
        index: usize,
        expected: LayerKind,
        actual: LayerKind,
    },
    #[error("non-finite value supplied for layer {index}")]
    NonFiniteValue { index: usize },
    #[error("scale {scale} for layer {index} must be finite and positive")]
    InvalidScale { index: usize, scale: f32 },
    #[error("font pixel size for layer {index} must be positive")]
    InvalidFontSize { index: usize },
}

/// Mutable view of an unlocked raster layer handed to the paint engine.
#[derive(Debug)]
pub struct PaintTarget<'a> {
    pub pixels: &'a mut PixelBuffer,
    pub position: Offset,
    pub scale: f32,
}

/// Ordered layers of one document.
///
/// Storage order is bottom-to-top. Every public index is top-to-bottom
/// (0 = topmost) and goes through [`LayerStack::translate_index`].
#[derive(Debug, Clone)]
pub struct LayerStack {
    layers: SlotMap<LayerId, Layer>,
    order: Vec<LayerId>,
    background: LayerId,
    active: LayerId,
}

impl LayerStack {
    pub fn new(background_color: Color) -> Self {
        let mut layers = SlotMap::with_key();
        let mut background = Layer::solid(BACKGROUND_LAYER_NAME, background_color);
        background.set_locked(true);
        let background = layers.insert(background);
        Self {
            layers,
            order: vec![background],
            background,
            active: background,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Never true: the background layer is always present.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Maps a top-to-bottom index to its storage slot and back; the mapping
    /// is its own inverse.
    fn translate_index(&self, index: usize) -> Result<usize, LayerStackError> {
        let len = self.order.len();
        if index >= len {
            return Err(LayerStackError::InvalidIndex { index, len });
        }
        Ok(len - index - 1)
    }

    fn id_at(&self, index: usize) -> Result<LayerId, LayerStackError> {
        Ok(self.order[self.translate_index(index)?])
    }

    fn layer_at_mut(&mut self, index: usize) -> Result<(LayerId, &mut Layer), LayerStackError> {
        let id = self.id_at(index)?;
        Ok((id, &mut self.layers[id]))
    }

    fn unlocked_layer_at_mut(&mut self, index: usize) -> Result<&mut Layer, LayerStackError> {
        let (_, layer) = self.layer_at_mut(index)?;
        if layer.locked() {
            return Err(LayerStackError::LayerLocked { index });
        }
        Ok(layer)
    }

    fn renumber(&mut self) {
        for (z_index, id) in self.order.iter().enumerate() {
            self.layers[*id].set_z_index(z_index);
        }
    }

    pub fn add(&mut self, mut layer: Layer) -> LayerId {
        layer.set_z_index(self.order.len());
        let name = layer.name().to_owned();
        let id = self.layers.insert(layer);
        self.order.push(id);
        self.active = id;
        debug!(layer = %name, count = self.order.len(), "layer added");
        id
    }

    /// Removes the layer at `index`. The background layer is never removed;
    /// targeting it returns `Ok(None)` and leaves the stack untouched.
    pub fn remove(&mut self, index: usize) -> Result<Option<Layer>, LayerStackError> {
        let internal = self.translate_index(index)?;
        let id = self.order[internal];
        if id == self.background {
            debug!("ignored removal of background layer");
            return Ok(None);
        }
        self.order.remove(internal);
        let removed = self.layers.remove(id);
        if self.active == id {
            self.active = self.order.last().copied().unwrap_or(self.background);
        }
        self.renumber();
        Ok(removed)
    }

    /// Swaps the layer at `index` with its neighbour in `direction`.
    ///
    /// The background is the floor of the stack: moving it, or moving the
    /// layer directly above it down, is out of bounds.
    pub fn move_layer(
        &mut self,
        index: usize,
        direction: MoveDirection,
    ) -> Result<(), LayerStackError> {
        let len = self.order.len();
        let internal = self.translate_index(index)?;
        let out_of_bounds = LayerStackError::InvalidIndex { index, len };
        let target = match direction {
            MoveDirection::Up => internal.checked_add(1).filter(|target| *target < len),
            MoveDirection::Down => internal.checked_sub(1),
        }
        .ok_or(out_of_bounds.clone())?;
        if self.order[internal] == self.background || self.order[target] == self.background {
            return Err(out_of_bounds);
        }
        self.order.swap(internal, target);
        self.renumber();
        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<&Layer, LayerStackError> {
        Ok(&self.layers[self.id_at(index)?])
    }

    pub fn id(&self, index: usize) -> Result<LayerId, LayerStackError> {
        self.id_at(index)
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id)
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        let internal = self.order.iter().position(|candidate| *candidate == id)?;
        self.translate_index(internal).ok()
    }

    pub fn background_id(&self) -> LayerId {
        self.background
    }

    pub fn background(&self) -> &Layer {
        &self.layers[self.background]
    }

    pub fn is_background(&self, index: usize) -> bool {
        self.id_at(index).is_ok_and(|id| id == self.background)
    }

    pub fn active_id(&self) -> LayerId {
        self.active
    }

    pub fn active_index(&self) -> usize {
        self.index_of(self.active)
            .unwrap_or_else(|| unreachable!("active layer always belongs to the stack"))
    }

    pub fn active_layer(&self) -> &Layer {
        &self.layers[self.active]
    }

    pub fn select(&mut self, index: usize) -> Result<(), LayerStackError> {
        self.active = self.id_at(index)?;
        Ok(())
    }

    pub fn iter_bottom_to_top(&self) -> impl DoubleEndedIterator<Item = (LayerId, &Layer)> + '_ {
        self.order.iter().map(|id| (*id, &self.layers[*id]))
    }

    pub fn iter_top_to_bottom(&self) -> impl Iterator<Item = (LayerId, &Layer)> + '_ {
        self.iter_bottom_to_top().rev()
    }

    pub fn layer_names(&self) -> Vec<String> {
        self.iter_top_to_bottom()
            .map(|(_, layer)| layer.name().to_owned())
            .collect()
    }

    /// Returns `false` when the rename was refused (background layer or the
    /// reserved background name).
    pub fn rename(&mut self, index: usize, name: impl Into<String>) -> Result<bool, LayerStackError> {
        let name = name.into();
        let background = self.background;
        let (id, layer) = self.layer_at_mut(index)?;
        if id == background || name == BACKGROUND_LAYER_NAME {
            return Ok(false);
        }
        layer.set_name(name);
        Ok(true)
    }

    pub fn set_visible(&mut self, index: usize, visible: bool) -> Result<bool, LayerStackError> {
        let background = self.background;
        let (id, layer) = self.layer_at_mut(index)?;
        if id == background {
            return Ok(false);
        }
        layer.set_visible(visible);
        Ok(true)
    }

    pub fn set_locked(&mut self, index: usize, locked: bool) -> Result<bool, LayerStackError> {
        let background = self.background;
        let (id, layer) = self.layer_at_mut(index)?;
        if id == background {
            return Ok(false);
        }
        layer.set_locked(locked);
        Ok(true)
    }

    /// Clamps `opacity` into `[0, 1]`. Lock state does not prevent opacity
    /// changes; the background layer ignores them.
    pub fn set_opacity(&mut self, index: usize, opacity: f32) -> Result<bool, LayerStackError> {
        if !opacity.is_finite() {
            return Err(LayerStackError::NonFiniteValue { index });
        }
        let background = self.background;
        let (id, layer) = self.layer_at_mut(index)?;
        if id == background {
            return Ok(false);
        }
        layer.set_opacity(opacity.clamp(0.0, 1.0));
        Ok(true)
    }

    pub fn set_scale(&mut self, index: usize, scale: f32) -> Result<(), LayerStackError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(LayerStackError::InvalidScale { index, scale });
        }
        self.unlocked_layer_at_mut(index)?.set_scale(scale);
        Ok(())
    }

    pub fn set_position(&mut self, index: usize, position: Offset) -> Result<(), LayerStackError> {
        self.unlocked_layer_at_mut(index)?.set_position(position);
        Ok(())
    }

    pub fn set_fill_color(&mut self, index: usize, color: Color) -> Result<(), LayerStackError> {
        let layer = self.unlocked_layer_at_mut(index)?;
        let actual = layer.kind();
        if actual != LayerKind::Solid {
            return Err(LayerStackError::KindMismatch {
                index,
                expected: LayerKind::Solid,
                actual,
            });
        }
        if let LayerContent::Solid { fill_color } = layer.content_mut() {
            *fill_color = color;
        }
        Ok(())
    }

    fn text_content_mut(&mut self, index: usize) -> Result<&mut TextContent, LayerStackError> {
        let layer = self.unlocked_layer_at_mut(index)?;
        let actual = layer.kind();
        if actual != LayerKind::Text {
            return Err(LayerStackError::KindMismatch {
                index,
                expected: LayerKind::Text,
                actual,
            });
        }
        match layer.content_mut() {
            LayerContent::Text(text) => Ok(text),
            _ => unreachable!("kind checked above"),
        }
    }

    pub fn set_text(&mut self, index: usize, text: impl Into<String>) -> Result<(), LayerStackError> {
        self.text_content_mut(index)?.text = text.into();
        Ok(())
    }

    pub fn set_font(
        &mut self,
        index: usize,
        family: impl Into<String>,
        pixel_size: u32,
    ) -> Result<(), LayerStackError> {
        if pixel_size == 0 {
            return Err(LayerStackError::InvalidFontSize { index });
        }
        let content = self.text_content_mut(index)?;
        content.font_family = family.into();
        content.font_pixel_size = pixel_size;
        Ok(())
    }

    pub fn set_text_color(&mut self, index: usize, color: Color) -> Result<(), LayerStackError> {
        self.text_content_mut(index)?.color = color;
        Ok(())
    }

    /// Grants pixel access for painting. Fails with `LayerLocked` on locked
    /// layers and `KindMismatch` on non-raster layers.
    pub fn paint_target(&mut self, index: usize) -> Result<PaintTarget<'_>, LayerStackError> {
        let layer = self.unlocked_layer_at_mut(index)?;
        let actual = layer.kind();
        if actual != LayerKind::Raster {
            return Err(LayerStackError::KindMismatch {
                index,
                expected: LayerKind::Raster,
                actual,
            });
        }
        let position = layer.position();
        let scale = layer.scale();
        match layer.content_mut() {
            LayerContent::Raster { pixels } => Ok(PaintTarget {
                pixels,
                position,
                scale,
            }),
            _ => unreachable!("kind checked above"),
        }
    }

    pub(crate) fn set_background_color(&mut self, color: Color) {
        let background = &mut self.layers[self.background];
        if let LayerContent::Solid { fill_color } = background.content_mut() {
            *fill_color = color;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn z_order_is_permutation(stack: &LayerStack) -> bool {
        let mut seen: Vec<usize> = stack
            .iter_bottom_to_top()
            .map(|(_, layer)| layer.z_index())
            .collect();
        seen.sort_unstable();
        seen == (0..stack.len()).collect::<Vec<_>>()
    }

    fn stack_with(names: &[&str]) -> LayerStack {
        let mut stack = LayerStack::new(Color::WHITE);
        for name in names {
            stack.add(Layer::solid(*name, Color::RED));
        }
        stack
    }

    #[test]
    fn new_stack_holds_locked_background_at_bottom() {
        let stack = LayerStack::new(Color::TRANSPARENT);
        assert_eq!(stack.len(), 1);
        let background = stack.background();
        assert_eq!(background.name(), BACKGROUND_LAYER_NAME);
        assert!(background.locked());
        assert_eq!(background.z_index(), 0);
        assert_eq!(stack.active_id(), stack.background_id());
    }

    #[test]
    fn add_appends_on_top_and_becomes_active() {
        let mut stack = stack_with(&["a"]);
        let id = stack.add(Layer::solid("b", Color::BLACK));

        assert_eq!(stack.active_id(), id);
        assert_eq!(stack.active_index(), 0);
        assert_eq!(stack.get(0).expect("top layer").name(), "b");
        assert_eq!(stack.get(0).expect("top layer").z_index(), 2);
        assert_eq!(stack.layer_names(), vec!["b", "a", BACKGROUND_LAYER_NAME]);
    }

    #[test]
    fn get_rejects_out_of_range_index() {
        let stack = stack_with(&["a"]);
        let error = stack.get(2).expect_err("index 2 is out of range");
        assert_eq!(error, LayerStackError::InvalidIndex { index: 2, len: 2 });
    }

    #[test]
    fn remove_background_is_noop() {
        let mut stack = stack_with(&["a"]);
        let removed = stack.remove(1).expect("background index is valid");
        assert!(removed.is_none());
        assert_eq!(stack.len(), 2);
        assert!(stack.is_background(1));
    }

    #[test]
    fn remove_only_regular_layer_leaves_background_active() {
        let mut stack = stack_with(&["a"]);
        let removed = stack
            .remove(0)
            .expect("index 0 is valid")
            .expect("regular layer is removed");
        assert_eq!(removed.name(), "a");
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.active_id(), stack.background_id());
        assert!(z_order_is_permutation(&stack));
    }

    #[test]
    fn removing_active_layer_activates_topmost() {
        let mut stack = stack_with(&["a", "b", "c"]);
        stack.select(1).expect("select b");
        stack.remove(1).expect("remove b");
        assert_eq!(stack.active_layer().name(), "c");
        assert_eq!(
            stack.remove(5).expect_err("index 5 out of range"),
            LayerStackError::InvalidIndex { index: 5, len: 3 }
        );
    }

    #[test]
    fn move_swaps_neighbours_and_renumbers() {
        let mut stack = stack_with(&["a", "b", "c"]);
        stack.move_layer(2, MoveDirection::Up).expect("a moves up");
        assert_eq!(stack.layer_names(), vec!["c", "a", "b", BACKGROUND_LAYER_NAME]);
        stack.move_layer(0, MoveDirection::Down).expect("c moves down");
        assert_eq!(stack.layer_names(), vec!["a", "c", "b", BACKGROUND_LAYER_NAME]);
        for (index, expected_z) in [(0, 3), (1, 2), (2, 1), (3, 0)] {
            assert_eq!(stack.get(index).expect("layer").z_index(), expected_z);
        }
    }

    #[test]
    fn move_out_of_bounds_fails_without_reordering() {
        let mut stack = stack_with(&["a", "b"]);
        let before = stack.layer_names();

        assert_eq!(
            stack.move_layer(0, MoveDirection::Up),
            Err(LayerStackError::InvalidIndex { index: 0, len: 3 })
        );
        assert_eq!(
            stack.move_layer(2, MoveDirection::Down),
            Err(LayerStackError::InvalidIndex { index: 2, len: 3 })
        );
        assert_eq!(
            stack.move_layer(1, MoveDirection::Down),
            Err(LayerStackError::InvalidIndex { index: 1, len: 3 }),
            "layer above background cannot move below it"
        );
        assert_eq!(
            stack.move_layer(2, MoveDirection::Up),
            Err(LayerStackError::InvalidIndex { index: 2, len: 3 }),
            "background cannot move up"
        );
        assert_eq!(stack.layer_names(), before);
        assert!(z_order_is_permutation(&stack));
    }

    #[test]
    fn z_order_stays_a_permutation_across_edit_sequences() {
        let mut stack = LayerStack::new(Color::WHITE);
        for step in 0..40usize {
            match step % 5 {
                0 | 1 => {
                    stack.add(Layer::solid(format!("layer {step}"), Color::BLACK));
                }
                2 => {
                    let index = step % stack.len();
                    let _ = stack.move_layer(index, MoveDirection::Down);
                }
                3 => {
                    let index = (step * 7) % stack.len();
                    let _ = stack.move_layer(index, MoveDirection::Up);
                }
                _ => {
                    let index = (step * 3) % stack.len();
                    stack.remove(index).expect("index in range");
                }
            }
            assert!(z_order_is_permutation(&stack), "step {step}");
            assert_eq!(stack.background().z_index(), 0, "step {step}");
            assert!(stack.background().locked(), "step {step}");
        }
    }

    #[test]
    fn background_rejects_rename_visibility_lock_and_opacity() {
        let mut stack = stack_with(&["a"]);
        assert!(!stack.rename(1, "Paper").expect("valid index"));
        assert!(!stack.set_visible(1, false).expect("valid index"));
        assert!(!stack.set_locked(1, false).expect("valid index"));
        assert!(!stack.set_opacity(1, 0.5).expect("valid index"));

        let background = stack.background();
        assert_eq!(background.name(), BACKGROUND_LAYER_NAME);
        assert!(background.visible());
        assert!(background.locked());
        assert_eq!(background.opacity(), 1.0);
    }

    #[test]
    fn rename_refuses_reserved_background_name() {
        let mut stack = stack_with(&["a"]);
        assert!(!stack.rename(0, BACKGROUND_LAYER_NAME).expect("valid index"));
        assert!(stack.rename(0, "sky").expect("valid index"));
        assert_eq!(stack.get(0).expect("layer").name(), "sky");
    }

    #[test]
    fn set_opacity_clamps_and_rejects_non_finite() {
        let mut stack = stack_with(&["a"]);
        stack.set_opacity(0, 1.7).expect("clamped");
        assert_eq!(stack.get(0).expect("layer").opacity(), 1.0);
        stack.set_opacity(0, -0.3).expect("clamped");
        assert_eq!(stack.get(0).expect("layer").opacity(), 0.0);
        assert_eq!(
            stack.set_opacity(0, f32::NAN),
            Err(LayerStackError::NonFiniteValue { index: 0 })
        );
    }

    #[test]
    fn locked_layer_rejects_transform_and_content_edits() {
        let mut stack = stack_with(&["a"]);
        stack.set_locked(0, true).expect("lock");
        assert_eq!(
            stack.set_scale(0, 2.0),
            Err(LayerStackError::LayerLocked { index: 0 })
        );
        assert_eq!(
            stack.set_position(0, Offset::new(3, 4)),
            Err(LayerStackError::LayerLocked { index: 0 })
        );
        assert_eq!(
            stack.set_fill_color(0, Color::BLACK),
            Err(LayerStackError::LayerLocked { index: 0 })
        );
        assert!(stack.rename(0, "still renamable").expect("rename allowed"));
    }

    #[test]
    fn set_scale_requires_positive_finite_value() {
        let mut stack = stack_with(&["a"]);
        assert_eq!(
            stack.set_scale(0, 0.0),
            Err(LayerStackError::InvalidScale {
                index: 0,
                scale: 0.0
            })
        );
        stack.set_scale(0, 1.5).expect("valid scale");
        assert_eq!(stack.get(0).expect("layer").scale(), 1.5);
    }

    #[test]
    fn text_setters_require_text_layer() {
        let mut stack = stack_with(&["solid"]);
        stack.add(Layer::text("caption", TextContent::new("hello")));

        stack.set_text(0, "world").expect("text layer");
        stack.set_font(0, "Serif", 20).expect("text layer");
        stack.set_text_color(0, Color::RED).expect("text layer");
        match stack.get(0).expect("layer").content() {
            LayerContent::Text(text) => {
                assert_eq!(text.text, "world");
                assert_eq!(text.font_family, "Serif");
                assert_eq!(text.font_pixel_size, 20);
                assert_eq!(text.color, Color::RED);
            }
            other => panic!("expected text content, got {other:?}"),
        }

        assert_eq!(
            stack.set_text(1, "nope"),
            Err(LayerStackError::KindMismatch {
                index: 1,
                expected: LayerKind::Text,
                actual: LayerKind::Solid,
            })
        );
        assert_eq!(
            stack.set_font(0, "Serif", 0),
            Err(LayerStackError::InvalidFontSize { index: 0 })
        );
    }

    #[test]
    fn paint_target_checks_lock_and_kind_and_bumps_revision() {
        let mut stack = stack_with(&["solid"]);
        stack.add(Layer::raster(
            "ink",
            PixelBuffer::new(4, 4).expect("small buffer"),
        ));
        let before = stack.get(0).expect("raster").content_revision();

        {
            let target = stack.paint_target(0).expect("unlocked raster");
            assert_eq!(target.pixels.width(), 4);
        }
        assert!(stack.get(0).expect("raster").content_revision() > before);

        assert!(matches!(
            stack.paint_target(1),
            Err(LayerStackError::KindMismatch { index: 1, .. })
        ));
        stack.set_locked(0, true).expect("lock");
        assert!(matches!(
            stack.paint_target(0),
            Err(LayerStackError::LayerLocked { index: 0 })
        ));
    }
}
