//! Decoding of change documents into [`Directive`]s.

use super::xml::{Element, parse_tree, parse_tree_bytes};
use super::{AddGroup, AddUser, Directive, ModifyUserGroups};
use crate::error::{ParseError, ParseResult};

const USER_CLASS: &str = "Usuario";
const GROUP_CLASS: &str = "Grupo";

const ATTR_FULL_NAME: &str = "Nome Completo";
const ATTR_LOGIN: &str = "Login";
const ATTR_PHONE: &str = "Telefone";
const ATTR_GROUP: &str = "Grupo";
const ATTR_IDENTIFIER: &str = "Identificador";
const ATTR_DESCRIPTION: &str = "Descricao";
const ATTR_MEMBER: &str = "Membro";

/// A decoded change document.
///
/// Holds one entry per `add`/`modify` element, in document order. An element
/// that could not be decoded keeps its [`ParseError`] in place so the
/// remaining elements can still be applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeDocument {
    entries: Vec<ParseResult<Directive>>,
}

impl ChangeDocument {
    /// Every element's decoding result, in document order.
    pub fn entries(&self) -> &[ParseResult<Directive>] {
        &self.entries
    }

    /// Consume the document, yielding its entries in order.
    pub fn into_entries(self) -> Vec<ParseResult<Directive>> {
        self.entries
    }

    /// Successfully decoded directives, in document order.
    pub fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.entries.iter().filter_map(|entry| entry.as_ref().ok())
    }

    /// Elements that failed to decode.
    pub fn errors(&self) -> impl Iterator<Item = &ParseError> {
        self.entries.iter().filter_map(|entry| entry.as_ref().err())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decode a change document.
///
/// Fails as a whole only when the text is not well-formed XML. Problems
/// inside a single `add`/`modify` element are recorded against that element.
pub fn parse_document(xml: &str) -> ParseResult<ChangeDocument> {
    decode_tree(&parse_tree(xml)?)
}

/// Decode a change document from raw file contents, honouring its declared
/// encoding (for instance `ISO-8859-1`).
pub fn parse_document_bytes(xml: &[u8]) -> ParseResult<ChangeDocument> {
    decode_tree(&parse_tree_bytes(xml)?)
}

fn decode_tree(root: &Element) -> ParseResult<ChangeDocument> {
    let mut elements = Vec::new();
    collect_change_elements(root, &mut elements);

    let entries = elements.into_iter().map(parse_element).collect();
    Ok(ChangeDocument { entries })
}

/// Find `add`/`modify` elements without descending into them.
fn collect_change_elements<'a>(element: &'a Element, found: &mut Vec<&'a Element>) {
    if is_change_element(element) {
        found.push(element);
        return;
    }
    for child in &element.children {
        collect_change_elements(child, found);
    }
}

fn is_change_element(element: &Element) -> bool {
    element.name == "add" || element.name == "modify"
}

fn parse_element(element: &Element) -> ParseResult<Directive> {
    let class_name = element.attribute("class-name").unwrap_or_default();
    match (element.name.as_str(), class_name) {
        ("add", USER_CLASS) => parse_add_user(element).map(Directive::AddUser),
        ("add", GROUP_CLASS) => parse_add_group(element).map(Directive::AddGroup),
        ("modify", USER_CLASS) => parse_modify_user(element).map(Directive::ModifyUserGroups),
        (name, class_name) => Err(ParseError::UnknownClass {
            element: name.to_string(),
            class_name: class_name.to_string(),
        }),
    }
}

fn parse_add_user(element: &Element) -> ParseResult<AddUser> {
    Ok(AddUser {
        full_name: single_value(element, USER_CLASS, ATTR_FULL_NAME)?,
        login: single_value(element, USER_CLASS, ATTR_LOGIN)?,
        phone: single_value(element, USER_CLASS, ATTR_PHONE)?,
        groups: repeated_values(element, ATTR_GROUP),
    })
}

fn parse_add_group(element: &Element) -> ParseResult<AddGroup> {
    Ok(AddGroup {
        identifier: single_value(element, GROUP_CLASS, ATTR_IDENTIFIER)?,
        description: single_value(element, GROUP_CLASS, ATTR_DESCRIPTION)?,
        members: repeated_values(element, ATTR_MEMBER),
    })
}

fn parse_modify_user(element: &Element) -> ParseResult<ModifyUserGroups> {
    let association = element
        .descendants_named("association")
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::MissingAssociation {
            class_name: USER_CLASS.to_string(),
        })?;
    let login = association.text();
    if login.is_empty() {
        return Err(ParseError::empty_value(USER_CLASS, "association"));
    }

    let group_attrs = named_attributes(element, "modify-attr", ATTR_GROUP);
    if group_attrs.is_empty() {
        return Err(ParseError::missing_attribute(USER_CLASS, ATTR_GROUP));
    }

    let section_values = |section: &str| -> Vec<String> {
        group_attrs
            .iter()
            .flat_map(|attr| attr.children_named(section))
            .flat_map(|section| section.children_named("value"))
            .map(|value| value.text().to_string())
            .collect()
    };

    Ok(ModifyUserGroups {
        login: login.to_string(),
        remove_groups: section_values("remove-value"),
        add_groups: section_values("add-value"),
    })
}

/// Attribute elements (`add-attr`/`modify-attr`) carrying the given `attr-name`.
fn named_attributes<'a>(element: &'a Element, tag: &str, attr_name: &str) -> Vec<&'a Element> {
    element
        .descendants_named(tag)
        .into_iter()
        .filter(|attr| attr.attribute("attr-name") == Some(attr_name))
        .collect()
}

fn attribute_values<'a>(element: &'a Element, attr_name: &str) -> Vec<&'a str> {
    named_attributes(element, "add-attr", attr_name)
        .into_iter()
        .flat_map(|attr| attr.children_named("value"))
        .map(Element::text)
        .collect()
}

fn single_value(element: &Element, class_name: &str, attr_name: &str) -> ParseResult<String> {
    if named_attributes(element, "add-attr", attr_name).is_empty() {
        return Err(ParseError::missing_attribute(class_name, attr_name));
    }
    match attribute_values(element, attr_name).as_slice() {
        [] => Err(ParseError::missing_value(class_name, attr_name)),
        [""] => Err(ParseError::empty_value(class_name, attr_name)),
        [value] => Ok((*value).to_string()),
        values => Err(ParseError::MultipleValues {
            class_name: class_name.to_string(),
            attribute: attr_name.to_string(),
            count: values.len(),
        }),
    }
}

fn repeated_values(element: &Element, attr_name: &str) -> Vec<String> {
    attribute_values(element, attr_name)
        .into_iter()
        .map(str::to_string)
        .collect()
}
