//! Sprite renderer component

use crate::ecs::{Component, Entity};
use crate::foundation::collections::EntityId;
use crate::foundation::color::Color;
use crate::foundation::math::Vector;
use crate::foundation::value::{ImageRef, Value};

use super::commands::{DrawKind, DrawRecord};

/// Draws its entity as an image or, when vertices are set, a filled shape
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteRenderer {
    image: Option<ImageRef>,
    staged: Option<ImageRef>,
    tint: Color,
    opacity: f32,
    visible: bool,
    vertices: Option<Vec<Vector>>,
}

impl Default for SpriteRenderer {
    fn default() -> Self {
        Self {
            image: None,
            staged: None,
            tint: Color::WHITE,
            opacity: 1.0,
            visible: true,
            vertices: None,
        }
    }
}

impl SpriteRenderer {
    /// Renderer showing `image`
    pub fn new(image: ImageRef) -> Self {
        Self {
            image: Some(image),
            ..Self::default()
        }
    }

    /// Renderer filling a polygon
    pub fn shape(vertices: Vec<Vector>, color: Color) -> Self {
        Self {
            tint: color,
            vertices: Some(vertices),
            ..Self::default()
        }
    }

    /// Builder for the tint
    #[must_use]
    pub fn with_tint(mut self, tint: Color) -> Self {
        self.tint = tint;
        self
    }

    /// Image on screen
    pub const fn image(&self) -> Option<&ImageRef> {
        self.image.as_ref()
    }

    /// Image waiting for the next frame
    pub const fn staged(&self) -> Option<&ImageRef> {
        self.staged.as_ref()
    }

    /// Replace the image at the next frame
    pub fn set_image(&mut self, image: ImageRef) {
        self.staged = Some(image);
    }

    /// Tint
    pub const fn tint(&self) -> Color {
        self.tint
    }

    /// Set the tint
    pub fn set_tint(&mut self, tint: Color) {
        self.tint = tint;
    }

    /// Opacity
    pub const fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Set the opacity, clamped to `[0, 1]`
    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    /// Whether the renderer draws
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// Show or hide
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Shape vertices, if drawing a shape
    pub fn vertices(&self) -> Option<&[Vector]> {
        self.vertices.as_deref()
    }

    /// Swap in the staged image. Returns whether anything changed.
    pub(crate) fn commit(&mut self) -> bool {
        match self.staged.take() {
            Some(image) => {
                self.image = Some(image);
                true
            }
            None => false,
        }
    }

    /// Record for `entity`, or `None` when there is nothing to draw
    pub fn draw_record(&self, id: EntityId, entity: &Entity) -> Option<DrawRecord> {
        if !self.visible {
            return None;
        }
        let kind = match (&self.vertices, &self.image) {
            (Some(vertices), _) => DrawKind::Shape(vertices.clone()),
            (None, Some(image)) => DrawKind::Sprite(image.clone()),
            (None, None) => return None,
        };
        Some(DrawRecord {
            entity: id,
            layer_order: entity.layer_order(),
            kind,
            position: entity.position(),
            angle: entity.angle(),
            size: entity.size(),
            tint: self.tint,
            opacity: self.opacity,
        })
    }
}

impl Component for SpriteRenderer {
    fn name(&self) -> &'static str {
        "SpriteRenderer"
    }

    fn set_property(&mut self, name: &str, value: &Value) -> bool {
        match (name, value) {
            ("image", Value::Image(image)) => self.set_image(image.clone()),
            ("image", Value::Str(path)) => self.set_image(ImageRef::new(path.as_str())),
            ("tint" | "color", Value::Color(color)) => self.tint = *color,
            ("opacity", _) => match value.as_f32() {
                Some(opacity) => self.set_opacity(opacity),
                None => return false,
            },
            ("visible", Value::Bool(visible)) => self.visible = *visible,
            _ => return false,
        }
        true
    }

    fn property(&self, name: &str) -> Option<Value> {
        match name {
            "image" => self.image.clone().map(Value::Image),
            "tint" | "color" => Some(Value::Color(self.tint)),
            "opacity" => Some(Value::from(self.opacity)),
            "visible" => Some(Value::Bool(self.visible)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_swaps_on_commit() {
        let mut sprite = SpriteRenderer::new(ImageRef::new("a.png"));
        sprite.set_image(ImageRef::new("b.png"));
        assert_eq!(sprite.image().map(|i| i.name.as_str()), Some("a.png"));
        assert!(sprite.commit());
        assert_eq!(sprite.image().map(|i| i.name.as_str()), Some("b.png"));
        assert!(!sprite.commit());
    }

    #[test]
    fn test_hidden_sprite_has_no_record() {
        let entity = Entity::new("hero");
        let mut sprite = SpriteRenderer::new(ImageRef::new("hero.png"));
        sprite.set_visible(false);
        assert!(sprite.draw_record(EntityId::default(), &entity).is_none());
    }

    #[test]
    fn test_properties_from_animation() {
        let mut sprite = SpriteRenderer::default();
        assert!(sprite.set_property("opacity", &Value::Float(2.0)));
        assert_eq!(sprite.opacity(), 1.0);
        assert!(sprite.set_property("image", &Value::Str("walk_1.png".into())));
        assert_eq!(sprite.staged().map(|i| i.name.as_str()), Some("walk_1.png"));
        assert!(!sprite.set_property("speed", &Value::Float(1.0)));
    }
}
