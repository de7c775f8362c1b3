//! Style collaborator interfaces and the paint properties models read.

/// Directional light. `direction` is `[azimuthal, polar]` in degrees.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectionalLight {
    pub direction: [f64; 2],
    /// sRGB color.
    pub color: [f64; 3],
    pub intensity: f64,
    pub cast_shadows: bool,
    pub shadow_intensity: f64,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: [210.0, 30.0],
            color: [1.0, 1.0, 1.0],
            intensity: 0.5,
            cast_shadows: false,
            shadow_intensity: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AmbientLight {
    /// sRGB color.
    pub color: [f64; 3],
    pub intensity: f64,
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            intensity: 0.8,
        }
    }
}

/// A layer in paint order.
pub trait StyleLayer {
    fn id(&self) -> &str;

    fn source_id(&self) -> &str;

    /// The layer renders geometry into shadow maps.
    fn has_shadow_pass(&self) -> bool;

    fn is_hidden(&self, zoom: f64) -> bool;

    /// Model layers draw instanced models and are rendered even without tiles.
    fn is_model_layer(&self) -> bool {
        false
    }
}

pub trait Style {
    /// Layers in paint order.
    fn layers(&self) -> Vec<&dyn StyleLayer>;

    fn directional_light(&self) -> Option<&DirectionalLight>;

    fn ambient_light(&self) -> Option<&AmbientLight>;
}

/// Evaluated paint properties of a model layer.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelPaint {
    pub opacity: f64,
    /// Degrees around x, y and z.
    pub rotation: [f64; 3],
    pub scale: [f64; 3],
    /// Meters east, north and up.
    pub translation: [f64; 3],
    pub color: [f64; 4],
    pub color_mix_intensity: f64,
    pub emissive_strength: f64,
    pub cast_shadows: bool,
    pub receive_shadows: bool,
}

impl Default for ModelPaint {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            rotation: [0.0; 3],
            scale: [1.0; 3],
            translation: [0.0; 3],
            color: [1.0, 1.0, 1.0, 1.0],
            color_mix_intensity: 0.0,
            emissive_strength: 0.0,
            cast_shadows: true,
            receive_shadows: true,
        }
    }
}

/// A model layer as seen by the draw dispatcher.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelLayer {
    pub id: String,
    pub source_id: String,
    pub paint: ModelPaint,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub visible: bool,
}

impl ModelLayer {
    pub fn new(id: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            paint: ModelPaint::default(),
            min_zoom: 0.0,
            max_zoom: 24.0,
            visible: true,
        }
    }
}

impl StyleLayer for ModelLayer {
    fn id(&self) -> &str {
        &self.id
    }

    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn has_shadow_pass(&self) -> bool {
        self.paint.cast_shadows
    }

    fn is_hidden(&self, zoom: f64) -> bool {
        !self.visible || zoom < self.min_zoom || zoom >= self.max_zoom
    }

    fn is_model_layer(&self) -> bool {
        true
    }
}
