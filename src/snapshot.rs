//! Immutable descriptor trees for one version of a schema.
//!
//! A `FileSnapshot` is built once from a parsed `FileDescriptorProto` and is
//! only ever read afterwards. Messages keep their declaration order so that
//! traversal and annotation order are stable.

use protobuf::UnknownFields;
use protobuf::descriptor::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use std::collections::HashMap;

// Field numbers inside FileDescriptorProto / DescriptorProto, used to build
// source code info paths.
const FILE_MESSAGE_TYPE: i32 = 4;
const MESSAGE_FIELD: i32 = 2;
const MESSAGE_NESTED_TYPE: i32 = 3;

/// 1-based position of a descriptor's declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub line: u32,
    pub column: u32,
}

/// Read-only view shared by message and field descriptors, used when
/// attributing annotations.
pub trait Descriptor {
    /// Element type as shown in reports ("message", "field").
    fn element_type(&self) -> &'static str;
    fn full_name(&self) -> &str;
    fn file_path(&self) -> &str;
    fn span(&self) -> Option<SourceSpan>;
}

/// One `.proto` file: its path, package and top-level messages.
#[derive(Debug, Clone, Default)]
pub struct FileSnapshot {
    pub path: String,
    pub package: String,
    pub messages: Vec<MessageDescriptor>,
}

#[derive(Debug, Clone, Default)]
pub struct MessageDescriptor {
    pub name: String,
    pub full_name: String,
    pub file_path: String,
    pub fields: Vec<FieldDescriptor>,
    pub nested_messages: Vec<MessageDescriptor>,
    /// Unknown fields of `MessageOptions`, where custom options such as
    /// `(buf.validate.message)` end up after parsing.
    pub options: UnknownFields,
    pub span: Option<SourceSpan>,
}

#[derive(Debug, Clone, Default)]
pub struct FieldDescriptor {
    pub name: String,
    pub number: i32,
    pub full_name: String,
    pub file_path: String,
    /// Unknown fields of `FieldOptions`.
    pub options: UnknownFields,
    pub span: Option<SourceSpan>,
}

impl FileSnapshot {
    pub fn from_proto(file: &FileDescriptorProto) -> Self {
        let spans = collect_spans(file);
        let path = file.name().to_string();
        let package = file.package().to_string();

        let messages = file
            .message_type
            .iter()
            .enumerate()
            .map(|(i, msg)| {
                let source_path = vec![FILE_MESSAGE_TYPE, i as i32];
                MessageDescriptor::from_proto(msg, &package, &path, source_path, &spans)
            })
            .collect();

        FileSnapshot {
            path,
            package,
            messages,
        }
    }

    /// Top-level message by name.
    pub fn message(&self, name: &str) -> Option<&MessageDescriptor> {
        self.messages.iter().find(|m| m.name == name)
    }

    /// Visits every message in the file, parents before their nested
    /// messages, in declaration order.
    pub fn walk_messages(&self) -> Vec<&MessageDescriptor> {
        fn walk<'a>(messages: &'a [MessageDescriptor], out: &mut Vec<&'a MessageDescriptor>) {
            for message in messages {
                out.push(message);
                walk(&message.nested_messages, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.messages, &mut out);
        out
    }
}

impl MessageDescriptor {
    fn from_proto(
        msg: &DescriptorProto,
        scope: &str,
        file_path: &str,
        source_path: Vec<i32>,
        spans: &HashMap<Vec<i32>, SourceSpan>,
    ) -> Self {
        let name = msg.name().to_string();
        let full_name = qualify(scope, &name);

        let fields = msg
            .field
            .iter()
            .enumerate()
            .map(|(i, field)| {
                let mut field_path = source_path.clone();
                field_path.extend([MESSAGE_FIELD, i as i32]);
                FieldDescriptor::from_proto(field, &full_name, file_path, &field_path, spans)
            })
            .collect();

        let nested_messages = msg
            .nested_type
            .iter()
            .enumerate()
            .map(|(i, nested)| {
                let mut nested_path = source_path.clone();
                nested_path.extend([MESSAGE_NESTED_TYPE, i as i32]);
                MessageDescriptor::from_proto(nested, &full_name, file_path, nested_path, spans)
            })
            .collect();

        let options = msg
            .options
            .as_ref()
            .map(|opts| opts.special_fields.unknown_fields().clone())
            .unwrap_or_default();

        MessageDescriptor {
            name,
            full_name,
            file_path: file_path.to_string(),
            fields,
            nested_messages,
            options,
            span: spans.get(&source_path).copied(),
        }
    }

    /// Field by number.
    pub fn field(&self, number: i32) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.number == number)
    }

    /// Nested message by name.
    pub fn nested_message(&self, name: &str) -> Option<&MessageDescriptor> {
        self.nested_messages.iter().find(|m| m.name == name)
    }
}

impl FieldDescriptor {
    fn from_proto(
        field: &FieldDescriptorProto,
        message_full_name: &str,
        file_path: &str,
        source_path: &[i32],
        spans: &HashMap<Vec<i32>, SourceSpan>,
    ) -> Self {
        let name = field.name().to_string();
        let options = field
            .options
            .as_ref()
            .map(|opts| opts.special_fields.unknown_fields().clone())
            .unwrap_or_default();

        FieldDescriptor {
            full_name: qualify(message_full_name, &name),
            name,
            number: field.number(),
            file_path: file_path.to_string(),
            options,
            span: spans.get(source_path).copied(),
        }
    }
}

impl Descriptor for MessageDescriptor {
    fn element_type(&self) -> &'static str {
        "message"
    }

    fn full_name(&self) -> &str {
        &self.full_name
    }

    fn file_path(&self) -> &str {
        &self.file_path
    }

    fn span(&self) -> Option<SourceSpan> {
        self.span
    }
}

impl Descriptor for FieldDescriptor {
    fn element_type(&self) -> &'static str {
        "field"
    }

    fn full_name(&self) -> &str {
        &self.full_name
    }

    fn file_path(&self) -> &str {
        &self.file_path
    }

    fn span(&self) -> Option<SourceSpan> {
        self.span
    }
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

/// Maps source code info paths to their (1-based) start position. Parsers
/// that do not emit source code info yield an empty map.
fn collect_spans(file: &FileDescriptorProto) -> HashMap<Vec<i32>, SourceSpan> {
    let Some(info) = file.source_code_info.as_ref() else {
        return HashMap::new();
    };

    info.location
        .iter()
        .filter(|loc| loc.span.len() >= 3)
        .map(|loc| {
            let span = SourceSpan {
                line: loc.span[0] as u32 + 1,
                column: loc.span[1] as u32 + 1,
            };
            (loc.path.clone(), span)
        })
        .collect()
}
