//! Compiled-type introspection.
//!
//! Exposes, per compiled type, its simple name, fully-qualified name and the
//! annotation entries attached to the class. [`TypeSource`] is the narrow seam
//! the scanner depends on; [`ClassDirSource`] is the adapter over a directory
//! of JVM `.class` files.
//!
//! The reader decodes only what matching needs: the constant pool,
//! `this_class`, and the `RuntimeVisibleAnnotations` /
//! `RuntimeInvisibleAnnotations` class attributes. Fields, methods and code
//! are skipped.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ClassFileError, ScanError};

const CLASS_MAGIC: u32 = 0xCAFE_BABE;
const VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
const INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";

/// Metadata of one compiled type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    /// Name without package, e.g. `UserServiceImpl` or `Outer$Inner`.
    pub simple_name: String,
    /// Dotted fully-qualified name, e.g. `com.acme.Outer$Inner`.
    pub fqn: String,
    /// Class-level annotations, visible and invisible.
    pub annotations: Vec<AnnotationEntry>,
}

impl TypeInfo {
    pub fn new(fqn: impl Into<String>) -> Self {
        let fqn = fqn.into();
        let simple_name = fqn.rsplit('.').next().unwrap_or(&fqn).to_string();
        Self {
            simple_name,
            fqn,
            annotations: Vec::new(),
        }
    }

    pub fn with_annotation(mut self, entry: AnnotationEntry) -> Self {
        self.annotations.push(entry);
        self
    }

    /// Find an attached annotation by its internal descriptor (`Lcom/x/Ann;`).
    pub fn annotation(&self, descriptor: &str) -> Option<&AnnotationEntry> {
        self.annotations
            .iter()
            .find(|a| a.type_descriptor == descriptor)
    }
}

/// One annotation attached to a type.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationEntry {
    /// Internal descriptor form, e.g. `Lorg/osgi/service/component/annotations/Component;`.
    pub type_descriptor: String,
    pub pairs: Vec<ElementValuePair>,
}

impl AnnotationEntry {
    pub fn new(type_descriptor: impl Into<String>) -> Self {
        Self {
            type_descriptor: type_descriptor.into(),
            pairs: Vec::new(),
        }
    }

    pub fn with_pair(mut self, name: impl Into<String>, value: ElementValue) -> Self {
        self.pairs.push(ElementValuePair {
            name: name.into(),
            value,
        });
        self
    }

    pub fn element(&self, name: &str) -> Option<&ElementValue> {
        self.pairs.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    fn stringify(&self) -> String {
        let pairs: Vec<String> = self
            .pairs
            .iter()
            .map(|p| format!("{}={}", p.name, p.value.stringify()))
            .collect();
        format!("@{}({})", self.type_descriptor, pairs.join(","))
    }
}

/// Named element of an annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementValuePair {
    pub name: String,
    pub value: ElementValue,
}

/// Value of an annotation element.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// Primitive or string constant, already rendered as text.
    Const(String),
    Enum {
        type_descriptor: String,
        constant: String,
    },
    /// Class literal, as its return descriptor.
    Class(String),
    Annotation(Box<AnnotationEntry>),
    Array(Vec<ElementValue>),
}

impl ElementValue {
    /// Text rendering used by property matching (`"connector=x"` stays as is).
    pub fn stringify(&self) -> String {
        match self {
            ElementValue::Const(text) => text.clone(),
            ElementValue::Enum { constant, .. } => constant.clone(),
            ElementValue::Class(descriptor) => descriptor.clone(),
            ElementValue::Annotation(entry) => entry.stringify(),
            ElementValue::Array(values) => {
                let parts: Vec<String> = values.iter().map(ElementValue::stringify).collect();
                format!("[{}]", parts.join(","))
            }
        }
    }

    pub fn as_array(&self) -> Option<&[ElementValue]> {
        match self {
            ElementValue::Array(values) => Some(values),
            _ => None,
        }
    }
}

/// Convert a dotted type name into the internal descriptor form.
///
/// `org.osgi.Component` becomes `Lorg/osgi/Component;`.
pub fn descriptor_for(dotted: &str) -> String {
    format!("L{};", dotted.trim().replace('.', "/"))
}

/// Provider of compiled types under a scan root.
pub trait TypeSource {
    fn load_types(&self, root: &Path) -> Result<Vec<TypeInfo>, ScanError>;
}

/// Reads every `*.class` file below a directory.
#[derive(Debug, Clone, Default)]
pub struct ClassDirSource {
    timeout: Option<Duration>,
}

impl ClassDirSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort the walk once it has run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl TypeSource for ClassDirSource {
    fn load_types(&self, root: &Path) -> Result<Vec<TypeInfo>, ScanError> {
        let started = Instant::now();
        let mut types = Vec::new();

        for entry in WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
        {
            if let Some(limit) = self.timeout
                && started.elapsed() > limit
            {
                return Err(ScanError::Timeout {
                    root: root.to_path_buf(),
                    secs: limit.as_secs(),
                });
            }

            let entry = match entry {
                Ok(e) => e,
                Err(e) if e.depth() == 0 => {
                    return Err(ScanError::Walk {
                        root: root.to_path_buf(),
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!("skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("class") {
                continue;
            }
            // Module and package descriptors are not types.
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            if stem == "module-info" || stem == "package-info" {
                continue;
            }

            let bytes = match fs::read(path) {
                Ok(b) => b,
                Err(e) => {
                    warn!("failed to read {}: {}", path.display(), e);
                    continue;
                }
            };
            match parse_class(&bytes) {
                Ok(info) => types.push(info),
                Err(e) => warn!("skipping {}: {}", path.display(), e),
            }
        }

        debug!("loaded {} types from {}", types.len(), root.display());
        Ok(types)
    }
}

#[derive(Debug, Clone)]
enum Constant {
    Unusable,
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    Other,
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ClassFileError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(ClassFileError::Truncated(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u1(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.take(1)?[0])
    }

    fn u2(&mut self) -> Result<u16, ClassFileError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u4(&mut self) -> Result<u32, ClassFileError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u8(&mut self) -> Result<u64, ClassFileError> {
        let hi = self.u4()? as u64;
        let lo = self.u4()? as u64;
        Ok((hi << 32) | lo)
    }
}

struct ConstantPool(Vec<Constant>);

impl ConstantPool {
    fn read(r: &mut Reader<'_>) -> Result<Self, ClassFileError> {
        let count = r.u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable);

        let mut index = 1usize;
        while index < count {
            let tag = r.u1()?;
            let constant = match tag {
                1 => {
                    let len = r.u2()? as usize;
                    // Modified UTF-8 only differs for NUL and supplementary
                    // characters, neither of which occurs in type names.
                    Constant::Utf8(String::from_utf8_lossy(r.take(len)?).into_owned())
                }
                3 => Constant::Integer(r.u4()? as i32),
                4 => Constant::Float(f32::from_bits(r.u4()?)),
                5 => Constant::Long(r.u8()? as i64),
                6 => Constant::Double(f64::from_bits(r.u8()?)),
                7 => Constant::Class(r.u2()?),
                8 | 16 | 19 | 20 => {
                    r.u2()?;
                    Constant::Other
                }
                9 | 10 | 11 | 12 | 17 | 18 => {
                    r.u4()?;
                    Constant::Other
                }
                15 => {
                    r.take(3)?;
                    Constant::Other
                }
                _ => {
                    return Err(ClassFileError::UnknownConstantTag {
                        tag,
                        index: index as u16,
                    });
                }
            };
            let wide = matches!(constant, Constant::Long(_) | Constant::Double(_));
            // A long or double takes two slots; both must fit in the pool.
            if wide && index + 1 >= count {
                return Err(ClassFileError::BadConstantIndex(index as u16));
            }
            entries.push(constant);
            index += 1;
            if wide {
                entries.push(Constant::Unusable);
                index += 1;
            }
        }
        Ok(Self(entries))
    }

    fn get(&self, index: u16) -> Result<&Constant, ClassFileError> {
        self.0
            .get(index as usize)
            .ok_or(ClassFileError::BadConstantIndex(index))
    }

    fn utf8(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            Constant::Utf8(s) => Ok(s),
            _ => Err(ClassFileError::BadConstantIndex(index)),
        }
    }

    fn class_name(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            Constant::Class(name_index) => self.utf8(*name_index),
            _ => Err(ClassFileError::BadConstantIndex(index)),
        }
    }

    fn const_text(&self, tag: u8, index: u16) -> Result<String, ClassFileError> {
        let text = match (tag, self.get(index)?) {
            (b'Z', Constant::Integer(v)) => (*v != 0).to_string(),
            (b'C', Constant::Integer(v)) => char::from_u32(*v as u32)
                .map(String::from)
                .unwrap_or_default(),
            (b'B' | b'S' | b'I', Constant::Integer(v)) => v.to_string(),
            (b'F', Constant::Float(v)) => format!("{v:?}"),
            (b'J', Constant::Long(v)) => v.to_string(),
            (b'D', Constant::Double(v)) => format!("{v:?}"),
            (b's', Constant::Utf8(s)) => s.clone(),
            _ => return Err(ClassFileError::BadConstantIndex(index)),
        };
        Ok(text)
    }
}

/// Decode one class file.
pub fn parse_class(bytes: &[u8]) -> Result<TypeInfo, ClassFileError> {
    let mut r = Reader::new(bytes);
    let magic = r.u4()?;
    if magic != CLASS_MAGIC {
        return Err(ClassFileError::BadMagic(magic));
    }
    r.u2()?; // minor
    r.u2()?; // major
    let pool = ConstantPool::read(&mut r)?;

    r.u2()?; // access flags
    let this_class = r.u2()?;
    r.u2()?; // super class
    let interfaces = r.u2()? as usize;
    r.take(interfaces * 2)?;

    for _ in 0..2 {
        // fields, then methods
        let members = r.u2()?;
        for _ in 0..members {
            r.take(6)?;
            skip_attributes(&mut r)?;
        }
    }

    let mut annotations = Vec::new();
    let attributes = r.u2()?;
    for _ in 0..attributes {
        let name = pool.utf8(r.u2()?)?;
        let len = r.u4()? as usize;
        let body = r.take(len)?;
        if name == VISIBLE_ANNOTATIONS || name == INVISIBLE_ANNOTATIONS {
            let mut sub = Reader::new(body);
            let count = sub.u2()?;
            for _ in 0..count {
                annotations.push(read_annotation(&mut sub, &pool)?);
            }
        }
    }

    let internal = pool.class_name(this_class)?;
    let mut info = TypeInfo::new(internal.replace('/', "."));
    info.annotations = annotations;
    Ok(info)
}

fn skip_attributes(r: &mut Reader<'_>) -> Result<(), ClassFileError> {
    let count = r.u2()?;
    for _ in 0..count {
        r.u2()?;
        let len = r.u4()? as usize;
        r.take(len)?;
    }
    Ok(())
}

fn read_annotation(r: &mut Reader<'_>, pool: &ConstantPool) -> Result<AnnotationEntry, ClassFileError> {
    let mut entry = AnnotationEntry::new(pool.utf8(r.u2()?)?);
    let pairs = r.u2()?;
    for _ in 0..pairs {
        let name = pool.utf8(r.u2()?)?.to_string();
        let value = read_element_value(r, pool)?;
        entry.pairs.push(ElementValuePair { name, value });
    }
    Ok(entry)
}

fn read_element_value(r: &mut Reader<'_>, pool: &ConstantPool) -> Result<ElementValue, ClassFileError> {
    let tag = r.u1()?;
    let value = match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => {
            ElementValue::Const(pool.const_text(tag, r.u2()?)?)
        }
        b'e' => {
            let type_descriptor = pool.utf8(r.u2()?)?.to_string();
            let constant = pool.utf8(r.u2()?)?.to_string();
            ElementValue::Enum {
                type_descriptor,
                constant,
            }
        }
        b'c' => ElementValue::Class(pool.utf8(r.u2()?)?.to_string()),
        b'@' => ElementValue::Annotation(Box::new(read_annotation(r, pool)?)),
        b'[' => {
            let count = r.u2()?;
            let mut values = Vec::with_capacity(count as usize);
            for _ in 0..count {
                values.push(read_element_value(r, pool)?);
            }
            ElementValue::Array(values)
        }
        other => return Err(ClassFileError::UnknownElementTag(other as char)),
    };
    Ok(value)
}


#[cfg(test)]
mod tests {
    use super::fixtures::{ClassBuilder, Ev};
    use super::*;
    use tempfile::TempDir;

    const OSGI_COMPONENT: &str = "org.osgi.service.component.annotations.Component";

    #[test]
    fn test_descriptor_for() {
        assert_eq!(
            descriptor_for("org.osgi.service.component.annotations.Component"),
            "Lorg/osgi/service/component/annotations/Component;"
        );
    }

    #[test]
    fn test_parse_names_and_annotations() {
        let bytes = ClassBuilder::new("com.acme.billing.InvoiceFactory")
            .annotation("org.springframework.stereotype.Service", vec![("value", Ev::Str("invoices"))])
            .invisible_annotation(
                OSGI_COMPONENT,
                vec![(
                    "property",
                    Ev::Array(vec![Ev::Str("connector=isma.himsa"), Ev::Str("version=2")]),
                )],
            )
            .build();

        let info = parse_class(&bytes).expect("parse");
        assert_eq!(info.fqn, "com.acme.billing.InvoiceFactory");
        assert_eq!(info.simple_name, "InvoiceFactory");
        assert_eq!(info.annotations.len(), 2);

        let component = info.annotation(&descriptor_for(OSGI_COMPONENT)).expect("component");
        let property = component.element("property").expect("property element");
        let values = property.as_array().expect("array");
        assert_eq!(values[0].stringify(), "connector=isma.himsa");
        assert_eq!(property.stringify(), "[connector=isma.himsa,version=2]");
    }

    #[test]
    fn test_parse_scalar_element_values() {
        let bytes = ClassBuilder::new("com.acme.Thing")
            .annotation(
                "com.acme.Meta",
                vec![
                    ("count", Ev::Int(7)),
                    ("enabled", Ev::Bool(true)),
                    ("mode", Ev::Enum("com.acme.Mode", "FAST")),
                    ("nested", Ev::Nested("com.acme.Inner", vec![("k", Ev::Str("v"))])),
                ],
            )
            .build();

        let info = parse_class(&bytes).expect("parse");
        let meta = &info.annotations[0];
        assert_eq!(meta.element("count").map(ElementValue::stringify).as_deref(), Some("7"));
        assert_eq!(meta.element("enabled").map(ElementValue::stringify).as_deref(), Some("true"));
        assert_eq!(meta.element("mode").map(ElementValue::stringify).as_deref(), Some("FAST"));
        assert_eq!(
            meta.element("nested").map(ElementValue::stringify).as_deref(),
            Some("@Lcom/acme/Inner;(k=v)")
        );
    }

    #[test]
    fn test_inner_class_name_keeps_marker() {
        let bytes = ClassBuilder::new("com.acme.Outer$Inner").build();
        let info = parse_class(&bytes).expect("parse");
        assert_eq!(info.fqn, "com.acme.Outer$Inner");
        assert_eq!(info.simple_name, "Outer$Inner");
    }

    #[test]
    fn test_rejects_bad_magic() {
        let err = parse_class(&[0, 1, 2, 3, 4, 5, 6, 7]).unwrap_err();
        assert!(matches!(err, ClassFileError::BadMagic(_)));
    }

    #[test]
    fn test_rejects_truncated() {
        let mut bytes = ClassBuilder::new("com.acme.Thing").build();
        bytes.truncate(bytes.len() - 3);
        assert!(parse_class(&bytes).is_err());
    }

    #[test]
    fn test_rejects_wide_constant_in_last_pool_slot() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&CLASS_MAGIC.to_be_bytes());
        bytes.extend_from_slice(&[0, 0, 0, 52]);
        bytes.extend_from_slice(&u16::MAX.to_be_bytes());
        for _ in 1..u16::MAX - 1 {
            bytes.push(3);
            bytes.extend_from_slice(&7u32.to_be_bytes());
        }
        // slot 65534: a long whose second half would be slot 65535
        bytes.push(5);
        bytes.extend_from_slice(&1u64.to_be_bytes());

        let err = parse_class(&bytes).unwrap_err();
        assert!(matches!(err, ClassFileError::BadConstantIndex(65534)));
    }

    #[test]
    fn test_class_dir_source_walks_and_skips_garbage() {
        let temp = TempDir::new().expect("temp dir");
        let pkg = temp.path().join("com/acme");
        fs::create_dir_all(&pkg).expect("mkdir");
        fs::write(pkg.join("A.class"), ClassBuilder::new("com.acme.A").build()).expect("write");
        fs::write(pkg.join("B.class"), ClassBuilder::new("com.acme.B").build()).expect("write");
        fs::write(pkg.join("Broken.class"), b"not a class").expect("write");
        fs::write(pkg.join("notes.txt"), b"ignored").expect("write");
        fs::write(temp.path().join("module-info.class"), b"ignored").expect("write");

        let types = ClassDirSource::new().load_types(temp.path()).expect("load");
        let names: Vec<_> = types.iter().map(|t| t.fqn.as_str()).collect();
        assert_eq!(names, vec!["com.acme.A", "com.acme.B"]);
    }

    #[test]
    fn test_class_dir_source_missing_root_errors() {
        let temp = TempDir::new().expect("temp dir");
        let err = ClassDirSource::new()
            .load_types(&temp.path().join("absent"))
            .unwrap_err();
        assert!(matches!(err, ScanError::Walk { .. }));
    }
}
