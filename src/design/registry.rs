//! The design registry: everything a run needs, built from a config AST.

use std::path::Path;

use tracing::info;

use super::types::{Layer, Material, MaterialId, MaterialKind, Net, NetId, ObjectId};
use crate::config::{ConfigAst, Section, SectionKind, Value};
use crate::error::{CapError, Result};
use crate::geometry::{Object, Role, Shape, V2i, V3f};
use crate::mesh::Space;
use crate::VACUUM_PERMITTIVITY;

/// Materials, objects, nets and the layered space they live in.
///
/// Objects and nets are addressed by index; layers belong to the space.
#[derive(Debug)]
pub struct Design {
    pub materials: Vec<Material>,
    pub objects: Vec<Object>,
    pub nets: Vec<Net>,
    pub space: Space,
}

impl Design {
    /// An empty design around `space`.
    pub fn new(space: Space) -> Self {
        Self {
            materials: Vec::new(),
            objects: Vec::new(),
            nets: Vec::new(),
            space,
        }
    }

    pub fn add_material(&mut self, material: Material) -> Result<MaterialId> {
        if self.material_id(&material.name).is_some() {
            return Err(CapError::DuplicateName {
                kind: "material",
                name: material.name,
            });
        }
        self.materials.push(material);
        Ok(MaterialId(self.materials.len() - 1))
    }

    pub fn add_object(&mut self, object: Object) -> Result<ObjectId> {
        if self.object_id(&object.name).is_some() {
            return Err(CapError::DuplicateName {
                kind: "object",
                name: object.name,
            });
        }
        self.objects.push(object);
        Ok(ObjectId(self.objects.len() - 1))
    }

    pub fn add_net(&mut self, net: Net) -> Result<NetId> {
        if self.net_id(&net.name).is_some() {
            return Err(CapError::DuplicateName {
                kind: "net",
                name: net.name,
            });
        }
        if net.objects.is_empty() {
            return Err(CapError::EmptyNet { net: net.name });
        }
        self.nets.push(net);
        Ok(NetId(self.nets.len() - 1))
    }

    pub fn material_id(&self, name: &str) -> Option<MaterialId> {
        self.materials.iter().position(|m| m.name == name).map(MaterialId)
    }

    pub fn object_id(&self, name: &str) -> Option<ObjectId> {
        self.objects.iter().position(|o| o.name == name).map(ObjectId)
    }

    pub fn net_id(&self, name: &str) -> Option<NetId> {
        self.nets.iter().position(|n| n.name == name).map(NetId)
    }

    pub fn net_names(&self) -> Vec<String> {
        self.nets.iter().map(|n| n.name.clone()).collect()
    }

    /// Drop every object bitmap.
    pub fn unload_objects(&mut self) {
        self.objects.iter_mut().for_each(Object::unload);
    }

    /// Build a design from a parsed configuration.
    ///
    /// Sections are resolved materials first, then objects, nets, layers
    /// and finally the single space, so references always point to
    /// something already built. Relative image paths are taken relative to
    /// `base_dir`.
    pub fn from_ast(ast: &ConfigAst, base_dir: &Path) -> Result<Self> {
        let mut spaces = ast.sections_of(SectionKind::Space);
        let space_section = spaces.next().ok_or(CapError::MissingSpace)?;
        if let Some(extra) = spaces.next() {
            return Err(CapError::DuplicateSpace {
                name: extra.title.clone(),
            });
        }

        // placeholder until the space section is read
        let mut design = Design::new(Space::new(&space_section.title, V3f::new(1.0, 1.0, 1.0)));

        for section in ast.sections_of(SectionKind::Material) {
            let material = material_from(section)?;
            info!(
                material = %material.name,
                permittivity = material.permittivity,
                "material"
            );
            design.add_material(material)?;
        }

        for section in ast.sections_of(SectionKind::Object) {
            let object = design.object_from(section, base_dir)?;
            info!(
                object = %object.name,
                role = ?object.role,
                pos = %object.pos(),
                size = %object.size(),
                "object"
            );
            design.add_object(object)?;
        }

        for section in ast.sections_of(SectionKind::Net) {
            let reader = Reader::new(section, &["objects"])?;
            let names = reader.required("objects")?;
            let objects = design.object_refs(section, names.value.items(), names.line)?;
            info!(net = %section.title, objects = objects.len(), "net");
            design.add_net(Net {
                name: section.title.clone(),
                objects,
            })?;
        }

        let mut layers = Vec::new();
        for section in ast.sections_of(SectionKind::Layer) {
            if layers.iter().any(|l: &Layer| l.name == section.title) {
                return Err(CapError::DuplicateName {
                    kind: "layer",
                    name: section.title.clone(),
                });
            }
            let layer = design.layer_from(section)?;
            info!(
                layer = %layer.name,
                height = layer.height,
                z_order = layer.z_order,
                "layer"
            );
            layers.push(layer);
        }

        design.space = space_from(space_section, layers)?;
        info!(
            space = %design.space.name(),
            step = %design.space.step(),
            layers = design.space.layers().len(),
            "space"
        );
        Ok(design)
    }

    fn object_from(&self, section: &Section, base_dir: &Path) -> Result<Object> {
        let reader = Reader::new(
            section,
            &["position", "size", "radius", "material", "type", "file", "role", "file-pos"],
        )?;

        let pos = reader.vector2("position")?;
        let material_name = reader.string("material")?;
        let material = self
            .material_id(material_name)
            .ok_or_else(|| CapError::UnknownMaterial {
                material: material_name.to_string(),
                owner: section.title.clone(),
            })?;

        let shape = match reader.string("type")? {
            "rectangle" => Shape::Rectangle {
                size: reader.vector2("size")?,
            },
            "circle" => Shape::Circle {
                radius: reader.int("radius")?,
            },
            "image" => {
                let file = reader.string("file")?;
                let entry = reader.required("file-pos")?;
                let coords = reader.ints_of(entry)?;
                if coords.len() < 2 || coords.len() % 2 != 0 {
                    return Err(reader.invalid(entry, "expected an even number of coordinates"));
                }
                Shape::Image {
                    path: base_dir.join(file),
                    seeds: coords.chunks(2).map(|c| V2i::new(c[0], c[1])).collect(),
                }
            }
            other => {
                let entry = reader.required("type")?;
                return Err(reader.invalid(entry, format!("unknown object type '{}'", other)));
            }
        };

        let role = match reader.string("role")? {
            "pin" => Role::Pin,
            "net" => Role::Net,
            "none" => Role::Passive,
            other => {
                let entry = reader.required("role")?;
                return Err(reader.invalid(entry, format!("unknown role '{}'", other)));
            }
        };

        let mut object = Object::new(&section.title, shape, pos, Some(material), role);
        object.load()?;
        object.unload();
        Ok(object)
    }

    fn layer_from(&self, section: &Section) -> Result<Layer> {
        let reader = Reader::new(section, &["height", "z-order", "objects", "material"])?;

        let height = reader.int("height")?;
        if height <= 0 {
            let entry = reader.required("height")?;
            return Err(reader.invalid(entry, "height must be positive"));
        }
        let z_order = reader.int("z-order")?;
        if z_order < 0 {
            let entry = reader.required("z-order")?;
            return Err(reader.invalid(entry, "z-order must not be negative"));
        }
        let material_name = reader.string("material")?;
        let material = self
            .material_id(material_name)
            .ok_or_else(|| CapError::UnknownMaterial {
                material: material_name.to_string(),
                owner: section.title.clone(),
            })?;

        let mut layer = Layer::new(&section.title, height, z_order, material);
        if let Some(entry) = section.get("objects") {
            layer.objects = self.object_refs(section, entry.value.items(), entry.line)?;
        }
        Ok(layer)
    }

    fn object_refs(
        &self,
        section: &Section,
        names: &[Value],
        line: usize,
    ) -> Result<Vec<ObjectId>> {
        names
            .iter()
            .map(|v| {
                let name = v.as_str().ok_or_else(|| {
                    CapError::invalid_value(
                        &section.title,
                        "objects",
                        line,
                        "expected object names",
                    )
                })?;
                self.object_id(name).ok_or_else(|| CapError::UnknownObject {
                    object: name.to_string(),
                    owner: section.title.clone(),
                })
            })
            .collect()
    }
}

fn material_from(section: &Section) -> Result<Material> {
    let reader = Reader::new(
        section,
        &["type", "permittivity", "conductivity", "permeability"],
    )?;

    let kind = match reader.optional("type") {
        None => MaterialKind::Dielectric,
        Some(entry) => {
            let s = reader.str_of(entry)?;
            MaterialKind::from_str(s)
                .ok_or_else(|| reader.invalid(entry, format!("unknown material type '{}'", s)))?
        }
    };
    let number_or = |key: &'static str, default: f64| -> Result<f64> {
        match reader.optional(key) {
            None => Ok(default),
            Some(entry) => reader.float_of(entry),
        }
    };

    Ok(Material {
        name: section.title.clone(),
        kind,
        permittivity: number_or("permittivity", VACUUM_PERMITTIVITY)?,
        conductivity: number_or("conductivity", 0.0)?,
        permeability: number_or("permeability", 0.0)?,
    })
}

fn space_from(section: &Section, mut layers: Vec<Layer>) -> Result<Space> {
    let reader = Reader::new(section, &["step", "layers"])?;

    let entry = reader.required("step")?;
    let step = reader.floats_of(entry)?;
    if step.len() != 3 || step.iter().any(|&s| !(s > 0.0)) {
        return Err(reader.invalid(entry, "expected three positive grid steps"));
    }
    let mut space = Space::new(&section.title, V3f::new(step[0], step[1], step[2]));

    let entry = reader.required("layers")?;
    for value in entry.value.items() {
        let name = value
            .as_str()
            .ok_or_else(|| reader.invalid(entry, "expected layer names"))?;
        let index = layers
            .iter()
            .position(|l| l.name == name)
            .ok_or_else(|| CapError::UnknownLayer {
                layer: name.to_string(),
                owner: section.title.clone(),
            })?;
        space.attach_layer(layers.swap_remove(index))?;
    }
    Ok(space)
}

/// Typed access to the entries of one section.
struct Reader<'s> {
    section: &'s Section,
}

impl<'s> Reader<'s> {
    /// Wrap `section`, rejecting keys outside `known`.
    fn new(section: &'s Section, known: &[&str]) -> Result<Self> {
        let reader = Self { section };
        if let Some(entry) = section.entries.iter().find(|e| !known.contains(&e.key.as_str())) {
            return Err(reader.invalid(entry, "unknown key"));
        }
        Ok(reader)
    }

    fn invalid(&self, entry: &crate::config::Entry, message: impl Into<String>) -> CapError {
        CapError::invalid_value(&self.section.title, &entry.key, entry.line, message)
    }

    fn optional(&self, key: &str) -> Option<&'s crate::config::Entry> {
        self.section.get(key)
    }

    fn required(&self, key: &'static str) -> Result<&'s crate::config::Entry> {
        self.section.get(key).ok_or_else(|| CapError::MissingKey {
            section: self.section.kind.keyword(),
            name: self.section.title.clone(),
            key,
        })
    }

    fn str_of(&self, entry: &'s crate::config::Entry) -> Result<&'s str> {
        entry
            .value
            .as_str()
            .ok_or_else(|| {
                self.invalid(entry, format!("expected string, got {}", entry.value.type_name()))
            })
    }

    fn float_of(&self, entry: &crate::config::Entry) -> Result<f64> {
        entry
            .value
            .as_f64()
            .ok_or_else(|| {
                self.invalid(entry, format!("expected number, got {}", entry.value.type_name()))
            })
    }

    fn ints_of(&self, entry: &crate::config::Entry) -> Result<Vec<i32>> {
        entry
            .value
            .items()
            .iter()
            .map(|v| {
                v.as_i32()
                    .ok_or_else(|| self.invalid(entry, format!("expected integer, got {}", v)))
            })
            .collect()
    }

    fn floats_of(&self, entry: &crate::config::Entry) -> Result<Vec<f64>> {
        entry
            .value
            .items()
            .iter()
            .map(|v| {
                v.as_f64()
                    .ok_or_else(|| self.invalid(entry, format!("expected number, got {}", v)))
            })
            .collect()
    }

    fn string(&self, key: &'static str) -> Result<&'s str> {
        self.str_of(self.required(key)?)
    }

    fn int(&self, key: &'static str) -> Result<i32> {
        let entry = self.required(key)?;
        entry
            .value
            .as_i32()
            .ok_or_else(|| self.invalid(entry, format!("expected integer, got {}", entry.value)))
    }

    fn vector2(&self, key: &'static str) -> Result<V2i> {
        let entry = self.required(key)?;
        match self.ints_of(entry)?.as_slice() {
            [x, y] => Ok(V2i::new(*x, *y)),
            _ => Err(self.invalid(entry, "expected two integers")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse;

    const BOARD: &str = r#"
        material "air" { }
        material "fr4" { permittivity = 3.98e-11 }
        material "copper" { type = "metal" conductivity = 5.8e7 }

        object "pad" {
            position = {2, 3}
            type = "rectangle"
            size = {4, 2}
            material = "copper"
            role = "net"
        }
        object "via" {
            position = {10, 10}
            type = "circle"
            radius = 2
            material = "copper"
            role = "pin"
        }

        net "sig" { objects = {"pad", "via"} }
        net "gnd" { objects = "via" }

        layer "core" { height = 4 z-order = 0 material = "fr4" }
        layer "top" { height = 2 z-order = 1 material = "air" objects = {"pad", "via"} }
        layer "unused" { height = 2 z-order = 1 material = "air" }

        space "board" { step = {1e-4, 1e-4, 5e-5} layers = {"top", "core"} }
    "#;

    fn build(src: &str) -> Result<Design> {
        Design::from_ast(&parse(src)?, Path::new("."))
    }

    #[test]
    fn test_from_ast() {
        let d = build(BOARD).unwrap();

        assert_eq!(d.materials.len(), 3);
        assert_eq!(d.materials[0].permittivity, VACUUM_PERMITTIVITY);
        assert_eq!(d.materials[0].kind, MaterialKind::Dielectric);
        assert_eq!(d.materials[2].kind, MaterialKind::Metal);
        assert_eq!(d.materials[2].conductivity, 5.8e7);

        let via = &d.objects[1];
        assert!(!via.is_loaded());
        assert_eq!(via.role, Role::Pin);
        assert_eq!(via.pos(), V2i::new(12, 12));
        assert_eq!(via.size(), V2i::new(4, 4));
        assert_eq!(via.material, Some(MaterialId(2)));

        assert_eq!(d.net_names(), vec!["sig".to_string(), "gnd".to_string()]);
        assert_eq!(d.nets[0].objects, vec![ObjectId(0), ObjectId(1)]);
        assert_eq!(d.nets[1].objects, vec![ObjectId(1)]);

        let layers = d.space.layers();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].name, "core");
        assert_eq!(layers[1].name, "top");
        assert_eq!(layers[1].z, 4);
        assert_eq!(d.space.size().z, 6);
        assert_eq!(d.space.step(), V3f::new(1e-4, 1e-4, 5e-5));
    }

    #[test]
    fn test_reference_errors() {
        let err = build(&BOARD.replace(r#"material = "fr4""#, r#"material = "fr5""#)).unwrap_err();
        assert!(matches!(err, CapError::UnknownMaterial { .. }));

        let err = build(&BOARD.replace(r#"objects = "via""#, r#"objects = "hole""#)).unwrap_err();
        assert!(matches!(err, CapError::UnknownObject { .. }));

        let err = build(&BOARD.replace(r#"{"top", "core"}"#, r#"{"top", "bottom"}"#)).unwrap_err();
        assert!(matches!(err, CapError::UnknownLayer { .. }));

        let err = build(&BOARD.replace(r#"{"top", "core"}"#, r#"{"top", "unused"}"#)).unwrap_err();
        assert!(matches!(err, CapError::DuplicateZOrder { .. }));
    }

    #[test]
    fn test_space_count() {
        let no_space = BOARD.replace("space", "# space");
        assert!(matches!(build(&no_space), Err(CapError::MissingSpace)));

        let two = format!("{}\nspace \"again\" {{ step = {{1, 1, 1}} layers = {{}} }}", BOARD);
        assert!(matches!(build(&two), Err(CapError::DuplicateSpace { .. })));
    }

    #[test]
    fn test_value_errors() {
        let err = build(&BOARD.replace("radius = 2", "radius = 2.5")).unwrap_err();
        assert!(matches!(err, CapError::InvalidValue { ref key, .. } if key == "radius"));

        let err = build(&BOARD.replace("size = {4, 2}", "size = {4}")).unwrap_err();
        assert!(matches!(err, CapError::InvalidValue { ref key, .. } if key == "size"));

        let err = build(&BOARD.replace("radius = 2", "diameter = 4")).unwrap_err();
        assert!(matches!(err, CapError::InvalidValue { ref key, .. } if key == "diameter"));

        let err = build(&BOARD.replace(r#"role = "pin""#, "")).unwrap_err();
        assert!(matches!(err, CapError::MissingKey { key: "role", .. }));

        let err = build(&BOARD.replace(r#"role = "pin""#, r#"role = "ground""#)).unwrap_err();
        assert!(matches!(err, CapError::InvalidValue { .. }));

        let err = build(&BOARD.replace("height = 4", "height = 0")).unwrap_err();
        assert!(matches!(err, CapError::InvalidValue { ref key, .. } if key == "height"));

        let err = build(&BOARD.replace("5e-5", "0")).unwrap_err();
        assert!(matches!(err, CapError::InvalidValue { ref key, .. } if key == "step"));

        let err = build(&BOARD.replace(r#"type = "metal""#, r#"type = "plasma""#)).unwrap_err();
        assert!(matches!(err, CapError::InvalidValue { ref key, .. } if key == "type"));
    }

    #[test]
    fn test_duplicates_and_empty_nets() {
        let err = build(&format!("{}\nmaterial \"air\" {{ }}", BOARD)).unwrap_err();
        assert!(matches!(err, CapError::DuplicateName { kind: "material", .. }));

        let err = build(&BOARD.replace(r#"objects = "via""#, "objects = {}")).unwrap_err();
        assert!(matches!(err, CapError::EmptyNet { .. }));
    }

    #[test]
    fn test_missing_image_reported() {
        let src = BOARD.replace(
            r#"type = "circle"
            radius = 2"#,
            r#"type = "image"
            file = "does-not-exist.png"
            file-pos = {1, 1}"#,
        );
        let err = build(&src).unwrap_err();
        assert!(matches!(err, CapError::ImageError { .. }));
    }
}
