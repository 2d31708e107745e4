use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, PoisonError},
};
use suds_util::{soap::XSD_NAMESPACE, xml::Element};

use crate::{
    error::Error,
    types::{AttributeDescriptor, ElementDescriptor, Namespace, Operation, Snapshot, TypeDescriptor, TypeRef},
};

pub const XSD_NAMESPACE_INDEX: usize = 0;

/// Built-in XSD types, in table order.
pub const XSD_TYPES: &[&str] = &[
    "anyType",
    "anySimpleType",
    "anyURI",
    "base64Binary",
    "boolean",
    "byte",
    "date",
    "dateTime",
    "decimal",
    "double",
    "duration",
    "ENTITIES",
    "ENTITY",
    "float",
    "gDay",
    "gMonth",
    "gMonthDay",
    "gYear",
    "gYearMonth",
    "hexBinary",
    "ID",
    "IDREF",
    "IDREFS",
    "int",
    "integer",
    "language",
    "long",
    "Name",
    "NCName",
    "negativeInteger",
    "NMTOKEN",
    "NMTOKENS",
    "nonNegativeInteger",
    "nonPositiveInteger",
    "normalizedString",
    "NOTATION",
    "positiveInteger",
    "QName",
    "short",
    "string",
    "time",
    "token",
    "unsignedByte",
    "unsignedInt",
    "unsignedLong",
    "unsignedShort",
];

pub const ANY_TYPE: TypeRef = TypeRef(XSD_NAMESPACE_INDEX, 0);

pub fn xsd_namespace() -> Namespace {
    Namespace {
        name: XSD_NAMESPACE.to_owned(),
        types: XSD_TYPES.iter().map(|name| (*name).to_owned()).collect(),
    }
}

pub fn xsd_type(name: &str) -> Option<TypeRef> {
    XSD_TYPES
        .iter()
        .position(|value| *value == name)
        .map(|index| TypeRef(XSD_NAMESPACE_INDEX, index))
}

/// Name lookups over the namespace tables.
#[derive(Debug, Clone, Default)]
pub struct TypeIndex {
    namespaces: HashMap<String, usize>,
    qualified: HashMap<(usize, String), TypeRef>,
    unqualified: HashMap<String, TypeRef>,
}

impl TypeIndex {
    pub fn new(namespaces: &[Namespace]) -> Self {
        let mut index = Self::default();

        for (ns, namespace) in namespaces.iter().enumerate() {
            index.namespaces.entry(namespace.name.clone()).or_insert(ns);

            for (position, name) in namespace.types.iter().enumerate() {
                let ty = TypeRef(ns, position);
                index.qualified.insert((ns, name.clone()), ty);
                index.unqualified.entry(name.clone()).or_insert(ty);
            }
        }

        index
    }

    pub fn namespace_index(&self, namespace: &str) -> Option<usize> {
        self.namespaces.get(namespace).copied()
    }

    pub fn find(&self, namespace: &str, name: &str) -> Option<TypeRef> {
        let ns = self.namespace_index(namespace)?;
        self.qualified.get(&(ns, name.to_owned())).copied()
    }

    /// First type with this local name in any namespace.
    pub fn find_any(&self, name: &str) -> Option<TypeRef> {
        self.unqualified.get(name).copied()
    }

    /// Resolves a type reference as written on `node`: `prefix:name`,
    /// `{namespace}name` or a bare name in `default_namespace` (XSD when
    /// not given).
    ///
    /// Some services reference types through a namespace that does not
    /// declare them, so a miss falls back to a scan of every namespace.
    pub fn resolve(
        &self,
        node: &Element,
        reference: &str,
        default_namespace: Option<&str>,
    ) -> Result<TypeRef, Error> {
        let (namespace, name) = split_reference(node, reference, default_namespace);

        namespace
            .and_then(|namespace| self.find(namespace, name))
            .or_else(|| self.find_any(name))
            .ok_or_else(|| Error::UnresolvedType(reference.to_owned()))
    }
}

/// Splits a QName or Clark-notation reference into its namespace and local
/// name.
pub fn split_reference<'a>(
    node: &'a Element,
    reference: &'a str,
    default_namespace: Option<&'a str>,
) -> (Option<&'a str>, &'a str) {
    if let Some((namespace, name)) = reference
        .strip_prefix('{')
        .and_then(|rest| rest.split_once('}'))
    {
        return (Some(namespace), name);
    }

    match reference.split_once(':') {
        Some((prefix, name)) => (node.lookup_namespace(Some(prefix)), name),
        None => (Some(default_namespace.unwrap_or(XSD_NAMESPACE)), reference),
    }
}

type Memo<V> = Mutex<HashMap<TypeRef, V>>;

/// The compiled type tables plus memoized inheritance queries.
#[derive(Debug)]
pub struct Schema {
    namespaces: Vec<Namespace>,
    types: Vec<Vec<TypeDescriptor>>,
    operations: BTreeMap<String, Operation>,
    index: TypeIndex,
    elements: Memo<Arc<[ElementDescriptor]>>,
    attributes: Memo<Arc<[AttributeDescriptor]>>,
}

impl Schema {
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, Error> {
        validate(&snapshot)?;

        let Snapshot {
            namespaces,
            types,
            operations,
        } = snapshot;

        Ok(Self {
            index: TypeIndex::new(&namespaces),
            namespaces,
            types,
            operations,
            elements: Mutex::default(),
            attributes: Mutex::default(),
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            namespaces: self.namespaces.clone(),
            types: self.types.clone(),
            operations: self.operations.clone(),
        }
    }

    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    pub fn operations(&self) -> &BTreeMap<String, Operation> {
        &self.operations
    }

    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }

    pub fn index(&self) -> &TypeIndex {
        &self.index
    }

    pub fn contains(&self, ty: TypeRef) -> bool {
        self.types
            .get(ty.namespace())
            .map_or(false, |types| ty.index() < types.len())
    }

    /// Panics if `ty` did not come from this schema.
    pub fn descriptor(&self, ty: TypeRef) -> &TypeDescriptor {
        &self.types[ty.namespace()][ty.index()]
    }

    pub fn namespace_uri(&self, ty: TypeRef) -> &str {
        &self.namespaces[ty.namespace()].name
    }

    pub fn type_name(&self, ty: TypeRef) -> &str {
        &self.namespaces[ty.namespace()].types[ty.index()]
    }

    /// `{namespace}name`
    pub fn qualified_name(&self, ty: TypeRef) -> String {
        format!("{{{}}}{}", self.namespace_uri(ty), self.type_name(ty))
    }

    pub fn find(&self, namespace: &str, name: &str) -> Option<TypeRef> {
        self.index.find(namespace, name)
    }

    pub fn resolve(&self, node: &Element, reference: &str, default_namespace: Option<&str>) -> Result<TypeRef, Error> {
        self.index.resolve(node, reference, default_namespace)
    }

    pub fn is_xsd(&self, ty: TypeRef) -> bool {
        ty.namespace() == XSD_NAMESPACE_INDEX
    }

    pub fn is_array(&self, ty: TypeRef) -> bool {
        self.type_name(ty).starts_with("ArrayOf")
    }

    pub fn is_simple(&self, ty: TypeRef) -> bool {
        self.descriptor(ty).is_simple()
    }

    /// The nearest non-XSD ancestor.
    pub fn base(&self, ty: TypeRef) -> Option<TypeRef> {
        self.descriptor(ty).base.filter(|base| !self.is_xsd(*base))
    }

    /// The XSD scalar at the end of the base chain, if there is one.
    pub fn scalar_base(&self, ty: TypeRef) -> Option<TypeRef> {
        let mut current = ty;

        loop {
            match self.descriptor(current).base {
                Some(base) if self.is_xsd(base) => return Some(base),
                Some(base) => current = base,
                None => return None,
            }
        }
    }

    pub fn derives_from(&self, ty: TypeRef, ancestor: TypeRef) -> bool {
        let mut current = Some(ty);

        while let Some(ty) = current {
            if ty == ancestor {
                return true;
            }

            current = self.base(ty);
        }

        false
    }

    /// Element descriptors in declaration order, inherited ones first.
    pub fn elements(&self, ty: TypeRef) -> Arc<[ElementDescriptor]> {
        self.flatten(&self.elements, ty, |descriptor| &descriptor.elements)
    }

    /// Attribute descriptors, inherited ones first.
    pub fn attributes(&self, ty: TypeRef) -> Arc<[AttributeDescriptor]> {
        self.flatten(&self.attributes, ty, |descriptor| &descriptor.attributes)
    }

    fn flatten<V: Clone>(&self, memo: &Memo<Arc<[V]>>, ty: TypeRef, own: fn(&TypeDescriptor) -> &Vec<V>) -> Arc<[V]> {
        if let Some(cached) = memo.lock().unwrap_or_else(PoisonError::into_inner).get(&ty) {
            return cached.clone();
        }

        let mut values = match self.base(ty) {
            Some(base) => self.flatten(memo, base, own).to_vec(),
            None => Vec::new(),
        };
        values.extend(own(self.descriptor(ty)).iter().cloned());

        let values: Arc<[V]> = values.into();
        memo.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ty, values.clone());

        values
    }
}

fn validate(snapshot: &Snapshot) -> Result<(), Error> {
    let invalid = |message: String| -> Result<(), Error> { Err(Error::InvalidSnapshot(message)) };

    if snapshot.namespaces.first() != Some(&xsd_namespace()) {
        return invalid("built-in XSD namespace does not match".into());
    }

    if snapshot.types.len() != snapshot.namespaces.len() {
        return invalid("type table does not match namespace table".into());
    }

    for (namespace, types) in snapshot.namespaces.iter().zip(&snapshot.types) {
        if namespace.types.len() != types.len() {
            return invalid(format!("type table for {} has the wrong length", namespace.name));
        }
    }

    let in_range = |ty: &TypeRef| {
        snapshot
            .types
            .get(ty.namespace())
            .map_or(false, |types| ty.index() < types.len())
    };

    for descriptor in snapshot.types.iter().flatten() {
        let refs = descriptor
            .elements
            .iter()
            .map(|element| &element.ty)
            .chain(descriptor.attributes.iter().map(|attribute| &attribute.ty))
            .chain(descriptor.base.iter())
            .chain(descriptor.unions.iter().flatten());

        for ty in refs {
            if !in_range(ty) {
                return invalid(format!("dangling type reference {:?}", ty));
            }
        }
    }

    for (name, operation) in &snapshot.operations {
        let refs = std::iter::once(&operation.input)
            .chain(operation.output.iter())
            .chain(operation.faults.iter());

        for message in refs {
            if !in_range(&message.ty) {
                return invalid(format!("dangling type reference in operation {}", name));
            }
        }
    }

    let total: usize = snapshot.types.iter().map(Vec::len).sum();
    for (ns, types) in snapshot.types.iter().enumerate() {
        for index in 0..types.len() {
            let mut current = TypeRef(ns, index);
            let mut steps = 0;

            while let Some(base) = snapshot.types[current.namespace()][current.index()].base {
                steps += 1;
                if steps > total {
                    return invalid(format!("inheritance cycle through {:?}", TypeRef(ns, index)));
                }
                current = base;
            }
        }
    }

    Ok(())
}
