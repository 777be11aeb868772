use std::sync::Arc;

use super::*;
use crate::error::{DecodeError, M3Error, ValidationError};
use crate::schema::{VERTEX_COLOR, VERTEX_POSITION};
use crate::structure::Reference;

fn registry() -> Arc<Registry> {
    Arc::new(Registry::bundled().unwrap())
}

struct Model {
    list: SectionList,
    model: SectionId,
    bones: SectionId,
}

fn push_default(list: &mut SectionList, id: SectionId, count: usize) {
    let position = list.position(id).unwrap();
    let description = list.section(position).unwrap().description().clone();
    let entries = list.entries_mut(position).unwrap();
    for _ in 0..count {
        entries.push(description.default_value());
    }
}

/// Header, model named "Test", two bones both named "Root"
fn build_model(dialect: Dialect) -> Model {
    let mut list = SectionList::new(registry(), dialect).unwrap();
    let header = list.header_id().unwrap();

    let model = list
        .section_for_reference(header, 0, "model", None, None)
        .unwrap();
    push_default(&mut list, model, 1);
    list.section_for_string(model, 0, "modelName", "Test").unwrap();

    let bones = list
        .section_for_reference(model, 0, "bones", None, None)
        .unwrap();
    push_default(&mut list, bones, 2);
    list.section_for_string(bones, 0, "name", "Root").unwrap();
    list.section_for_string(bones, 1, "name", "Root").unwrap();

    list.resolve().unwrap();
    Model { list, model, bones }
}

fn bone_names(list: &SectionList) -> Vec<Reference> {
    let bones = list.model().unwrap().reference("bones").unwrap();
    list.get(&bones)
        .unwrap()
        .iter()
        .map(|bone| bone.as_record().unwrap().reference("name").unwrap())
        .collect()
}

#[test]
fn test_new_list_has_header() {
    let list = SectionList::new(registry(), Dialect::Md34).unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list.section(0).unwrap().name(), "MD34");
    assert!(matches!(
        list.model(),
        Err(M3Error::Container(ContainerError::MissingModel))
    ));
}

#[test]
fn test_build_and_resolve() {
    let Model { list, bones, .. } = build_model(Dialect::Md34);
    assert_eq!(list.len(), 6);

    let model_ref = list.header().unwrap().reference("model").unwrap();
    assert_eq!(model_ref, Reference::new(1, 1));

    let model = list.model().unwrap();
    assert_eq!(list.string(&model.reference("modelName").unwrap()).unwrap(), "Test");
    assert_eq!(model.reference("modelName").unwrap().entries, 5);
    assert_eq!(model.reference("bones").unwrap().index as usize, list.position(bones).unwrap());
    assert_eq!(model.int("vertexFlags").unwrap(), 0x182007d);
    assert!(model.reference("sequences").unwrap().is_null());

    let names = bone_names(&list);
    assert_eq!(names.len(), 2);
    assert_ne!(names[0].index, names[1].index);
    assert_eq!(list.string(&names[1]).unwrap(), "Root");
}

#[test]
fn test_roundtrip_is_byte_identical() {
    let Model { mut list, .. } = build_model(Dialect::Md34);
    let bytes = list.to_bytes().unwrap();

    let mut reloaded = SectionList::from_bytes(list.registry().clone(), bytes.clone()).unwrap();
    assert_eq!(reloaded.len(), 6);
    assert_eq!(reloaded.dialect(), Dialect::Md34);
    for position in 0..list.len() {
        assert_eq!(
            reloaded.entries(position).unwrap(),
            list.entries(position).unwrap()
        );
    }
    assert_eq!(reloaded.to_bytes().unwrap(), bytes);
}

#[test]
fn test_file_layout() {
    let Model { mut list, .. } = build_model(Dialect::Md34);
    let bytes = list.to_bytes().unwrap();

    assert_eq!(&bytes[0..4], b"43DM");
    let header = FileHeader::from_bytes(&bytes).unwrap();
    assert_eq!(header.index_size, 6);
    assert_eq!(bytes.len(), header.index_offset as usize + 6 * IndexEntry::SIZE);

    // 24-byte header padded to the next 16-byte boundary
    assert!(bytes[24..32].iter().all(|&b| b == PAD_BYTE));

    let index = &bytes[header.index_offset as usize..];
    let entries: Vec<IndexEntry> = index
        .chunks_exact(IndexEntry::SIZE)
        .filter_map(IndexEntry::from_bytes)
        .collect();
    assert_eq!(entries[0].name(), "MD34");
    assert_eq!(entries[1].name(), "MODL");
    assert_eq!(entries[1].version, 23);
    assert_eq!(entries[1].offset, 32);
    assert_eq!(entries[2].name(), "CHAR");
    assert_eq!(entries[2].repetitions, 5);
    assert!(entries.iter().all(|e| e.offset as usize % ALIGNMENT == 0));

    assert_eq!(list.section(1).unwrap().index_entry(), Some(&entries[1]));
}

#[test]
fn test_reference_registered_twice() {
    let Model {
        mut list, bones, ..
    } = build_model(Dialect::Md34);
    let other_name = list.sections()[4].id();
    // bone 1's name already points at section 5
    list.attach_reference(bones, 1, "name", other_name).unwrap();

    let err = list.resolve().unwrap_err();
    assert!(matches!(
        err,
        M3Error::Container(ContainerError::ReferenceResolvedTwice { first: 4, second: 5, .. })
    ));
}

#[test]
fn test_multiple_owners() {
    let Model {
        mut list, model, ..
    } = build_model(Dialect::Md34);
    let name = list.sections()[2].id();
    list.attach_reference(model, 0, "boneLookup", name).unwrap();

    let err = list.resolve().unwrap_err();
    assert!(matches!(
        err,
        M3Error::Container(ContainerError::MultipleOwners { position: 2, owners: 2, .. })
    ));
}

#[test]
fn test_attach_requires_reference_field() {
    let Model {
        mut list, model, ..
    } = build_model(Dialect::Md34);
    let name = list.sections()[2].id();
    assert!(matches!(
        list.attach_reference(model, 0, "vertexFlags", name),
        Err(M3Error::Container(ContainerError::NotAReference { .. }))
    ));
    assert!(matches!(
        list.attach_reference(model, 3, "bones", name),
        Err(M3Error::Container(ContainerError::RecordOutOfRange { record: 3, .. }))
    ));
}

#[test]
fn test_factor_merges_equal_sections() {
    let Model { mut list, .. } = build_model(Dialect::Md34);
    let removed = list.factor_sections(&FactorOptions::default()).unwrap();
    assert_eq!(removed, 1);
    assert_eq!(list.len(), 5);

    let names = bone_names(&list);
    assert_eq!(names[0], names[1]);
    assert_eq!(names[0].entries, 5);
    assert_eq!(list.string(&names[0]).unwrap(), "Root");

    let shared = list.section(names[0].index as usize).unwrap();
    assert!(shared.is_shared());
    assert_eq!(shared.sites().len(), 2);

    // a second pass finds nothing left to merge
    assert_eq!(list.factor_sections(&FactorOptions::default()).unwrap(), 0);

    // sharing survives a save and reload
    let bytes = list.to_bytes().unwrap();
    let mut reloaded = SectionList::from_bytes(list.registry().clone(), bytes).unwrap();
    let names = bone_names(&reloaded);
    assert!(reloaded.section(names[0].index as usize).unwrap().is_shared());
    reloaded.resolve().unwrap();
}

#[test]
fn test_shared_section_rejects_new_referrer() {
    let Model {
        mut list, model, ..
    } = build_model(Dialect::Md34);
    list.factor_sections(&FactorOptions::default()).unwrap();
    let shared = list.section(bone_names(&list)[0].index as usize).unwrap().id();

    list.attach_reference(model, 0, "boneLookup", shared).unwrap();
    let position = list.position(shared).unwrap();
    let err = list.resolve().unwrap_err();
    assert!(matches!(
        err,
        M3Error::Container(ContainerError::MultipleOwners { position: p, owners: 3, .. }) if p == position
    ));

    // the same holds for sharing that came from a file
    let Model { mut list, .. } = build_model(Dialect::Md34);
    list.factor_sections(&FactorOptions::default()).unwrap();
    let bytes = list.to_bytes().unwrap();
    let mut reloaded = SectionList::from_bytes(list.registry().clone(), bytes).unwrap();
    let model = reloaded.sections()[1].id();
    let shared = reloaded
        .section(bone_names(&reloaded)[0].index as usize)
        .unwrap()
        .id();
    reloaded.attach_reference(model, 0, "boneLookup", shared).unwrap();
    assert!(matches!(
        reloaded.resolve(),
        Err(M3Error::Container(ContainerError::MultipleOwners { owners: 3, .. }))
    ));
}

#[test]
fn test_section_for_string_rejects_non_ascii() {
    let Model {
        mut list, bones, ..
    } = build_model(Dialect::Md34);
    let before = list.len();

    let err = list.section_for_string(bones, 0, "name", "Café").unwrap_err();
    match err {
        M3Error::Validation(ValidationError::NotAscii { path, text }) => {
            assert_eq!(path, "BONE[0].name");
            assert_eq!(text, "Café");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(list.len(), before);
    list.to_bytes().unwrap();
}

#[test]
fn test_factor_respects_exclusions() {
    let Model { mut list, .. } = build_model(Dialect::Md34);
    let excluded = list.referenced_sections("BONE.name").unwrap();
    assert_eq!(excluded.len(), 2);

    let options = FactorOptions::default().exclude(excluded);
    assert_eq!(list.factor_sections(&options).unwrap(), 0);
    assert_eq!(list.len(), 6);
}

#[test]
fn test_factor_keeps_distinct_sections() {
    let Model {
        mut list, bones, ..
    } = build_model(Dialect::Md34);
    let position = list.position(bones).unwrap();
    let name = list.entries(position).unwrap()[1]
        .as_record()
        .unwrap()
        .reference("name")
        .unwrap();
    list.entries_mut(name.index as usize).unwrap()[0] = Value::Int(b'X' as i64);

    assert_eq!(list.factor_sections(&FactorOptions::default()).unwrap(), 0);
    assert_eq!(list.len(), 6);
}

#[test]
fn test_factor_attachment_volumes() {
    let Model {
        mut list, model, ..
    } = build_model(Dialect::Md34);
    let volumes = list
        .section_for_reference(model, 0, "attachmentVolumes", None, None)
        .unwrap();
    push_default(&mut list, volumes, 2);
    for record in 0..2 {
        for field in ["unknown0", "unknown1"] {
            let id = list
                .section_for_reference(volumes, record, field, None, None)
                .unwrap();
            let position = list.position(id).unwrap();
            list.entries_mut(position).unwrap().push(Value::Int(7));
        }
    }
    list.resolve().unwrap();
    assert_eq!(list.len(), 11);

    let excluded = list.referenced_sections("ATVL.unknown0").unwrap();
    assert_eq!(excluded.len(), 2);
    let options = FactorOptions::default().exclude(excluded.iter().copied());

    // the CHAR "Root" pair plus the unknown1 pair
    assert_eq!(list.factor_sections(&options).unwrap(), 2);
    assert_eq!(list.len(), 9);

    let volumes = list.model().unwrap().reference("attachmentVolumes").unwrap();
    let records: Vec<Record> = list
        .get(&volumes)
        .unwrap()
        .iter()
        .map(|v| v.as_record().unwrap().clone())
        .collect();
    let first = records[0].reference("unknown1").unwrap();
    assert_eq!(first, records[1].reference("unknown1").unwrap());
    assert_ne!(
        records[0].reference("unknown0").unwrap(),
        records[1].reference("unknown0").unwrap()
    );
    for id in excluded {
        assert!(list.position(id).is_ok());
    }
}

#[test]
fn test_validate_drops_empty_sections() {
    let Model {
        mut list, model, ..
    } = build_model(Dialect::Md34);
    list.section_for_reference(model, 0, "sequences", None, Some(2))
        .unwrap();
    list.resolve().unwrap();
    assert_eq!(list.len(), 7);
    assert_eq!(list.model().unwrap().reference("sequences").unwrap().index, 2);

    list.validate().unwrap();
    assert_eq!(list.len(), 6);
    let model = list.model().unwrap();
    assert!(model.reference("sequences").unwrap().is_null());
    assert_eq!(model.reference("modelName").unwrap().index, 2);
    assert_eq!(list.string(&model.reference("modelName").unwrap()).unwrap(), "Test");
}

#[test]
fn test_validate_reports_bad_record() {
    let Model {
        mut list, bones, ..
    } = build_model(Dialect::Md34);
    let position = list.position(bones).unwrap();
    list.entries_mut(position).unwrap()[1]
        .as_record_mut()
        .unwrap()
        .set("parent", 70000)
        .unwrap();

    let err = list.validate().unwrap_err();
    assert!(matches!(
        err,
        M3Error::Validation(ValidationError::OutOfRange { ref path, .. }) if path == "BONE[1].parent"
    ));
}

#[test]
fn test_set_entry() {
    let Model {
        mut list, bones, ..
    } = build_model(Dialect::Md34);
    let position = list.position(bones).unwrap();

    let mut bone = list.entries(position).unwrap()[0].clone();
    bone.as_record_mut().unwrap().set("parent", 0).unwrap();
    list.set_entry(position, 1, bone.clone()).unwrap();
    assert_eq!(list.entries(position).unwrap()[1], bone);

    assert!(matches!(
        list.set_entry(position, 0, Value::Int(3)),
        Err(M3Error::Validation(ValidationError::WrongType { .. }))
    ));
    assert!(matches!(
        list.set_entry(position, 9, bone),
        Err(M3Error::Container(ContainerError::RecordOutOfRange { record: 9, .. }))
    ));
}

#[test]
fn test_insert_shifts_positions() {
    let Model {
        mut list, model, ..
    } = build_model(Dialect::Md34);
    let sequences = list
        .section_for_reference(model, 0, "sequences", None, Some(1))
        .unwrap();
    push_default(&mut list, sequences, 1);
    list.resolve().unwrap();

    assert_eq!(list.header().unwrap().reference("model").unwrap().index, 2);
    let model = list.model().unwrap();
    assert_eq!(model.reference("sequences").unwrap(), Reference::new(1, 1));
    assert_eq!(list.string(&model.reference("modelName").unwrap()).unwrap(), "Test");

    assert!(matches!(
        list.section_for_reference(list.header_id().unwrap(), 0, "model", None, Some(0)),
        Err(M3Error::Container(ContainerError::SectionOutOfRange { position: 0, .. }))
    ));
}

#[test]
fn test_lazy_load() {
    let Model { mut list, .. } = build_model(Dialect::Md34);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.m3");
    list.save(&path).unwrap();

    let mut lazy = SectionList::load(registry(), &path, LoadOptions::lazy()).unwrap();
    assert!(lazy.is_open());
    assert_eq!(lazy.path(), Some(path.as_path()));
    assert!(!lazy.section(3).unwrap().is_loaded());
    assert_eq!(lazy.section(3).unwrap().len(), 2);

    assert_eq!(lazy.entries(3).unwrap().len(), 2);
    assert!(lazy.section(3).unwrap().is_loaded());

    lazy.close();
    assert!(!lazy.is_open());
    assert_eq!(lazy.entries(3).unwrap().len(), 2);
    assert!(matches!(
        lazy.entries(4),
        Err(M3Error::Container(ContainerError::SourceClosed))
    ));
}

#[test]
fn test_eager_load_closes_file() {
    let Model { mut list, .. } = build_model(Dialect::Md34);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.m3");
    list.save(&path).unwrap();

    let loaded = SectionList::load(registry(), &path, LoadOptions::default()).unwrap();
    assert!(!loaded.is_open());
    assert!(loaded.sections().iter().all(Section::is_loaded));
    assert_eq!(loaded.section(4).unwrap().sites().len(), 1);
}

#[test]
fn test_md33_roundtrip() {
    let Model { mut list, .. } = build_model(Dialect::Md33);
    assert_eq!(list.section(0).unwrap().description().size(), 20);
    assert_eq!(list.section(1).unwrap().description().version(), 20);

    let bytes = list.to_bytes().unwrap();
    assert_eq!(&bytes[0..4], b"33DM");

    let mut reloaded = SectionList::from_bytes(list.registry().clone(), bytes.clone()).unwrap();
    assert_eq!(reloaded.dialect(), Dialect::Md33);
    assert_eq!(
        reloaded.string(&reloaded.model().unwrap().reference("modelName").unwrap()).unwrap(),
        "Test"
    );
    assert_eq!(reloaded.to_bytes().unwrap(), bytes);
}

#[test]
fn test_vertices() {
    let Model {
        mut list, model, ..
    } = build_model(Dialect::Md34);
    let model_position = list.position(model).unwrap();
    list.entries_mut(model_position).unwrap()[0]
        .as_record_mut()
        .unwrap()
        .set("vertexFlags", VERTEX_POSITION | VERTEX_COLOR)
        .unwrap();

    let vertices = list
        .section_for_reference(model, 0, "vertices", None, None)
        .unwrap();
    let position = list.position(vertices).unwrap();
    let mut raw = vec![0u8; 32];
    raw[0..4].copy_from_slice(&1.0f32.to_le_bytes());
    raw[16 + 8..16 + 12].copy_from_slice(&(-2.5f32).to_le_bytes());
    raw[31] = 0x7f;
    list.entries_mut(position)
        .unwrap()
        .extend(raw.iter().map(|&b| Value::Int(b as i64)));
    list.resolve().unwrap();

    let records = list.vertices().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].record("position").unwrap().float("x").unwrap(), 1.0);
    assert_eq!(records[1].record("position").unwrap().float("z").unwrap(), -2.5);
    assert_eq!(records[1].record("color").unwrap().int("alpha").unwrap(), 0x7f);

    // loaded files decode vertices from the raw section bytes
    let bytes = list.to_bytes().unwrap();
    let reloaded = SectionList::from_bytes(list.registry().clone(), bytes).unwrap();
    assert_eq!(reloaded.vertices().unwrap(), records);
}

#[test]
fn test_decode_errors() {
    assert!(matches!(
        SectionList::from_bytes(registry(), vec![0u8; 4]),
        Err(M3Error::Decode(DecodeError::TooSmall))
    ));

    let Model { mut list, .. } = build_model(Dialect::Md34);
    let bytes = list.to_bytes().unwrap();

    let mut bad_tag = bytes.clone();
    bad_tag[0..4].copy_from_slice(b"53DM");
    assert!(matches!(
        SectionList::from_bytes(registry(), bad_tag),
        Err(M3Error::Decode(DecodeError::UnknownHeaderTag(ref tag))) if tag == "MD35"
    ));

    // BONE.unknown0 must hold -1
    let bone_offset = list.section(3).unwrap().index_entry().unwrap().offset as usize;
    let mut bad_bone = bytes.clone();
    bad_bone[bone_offset..bone_offset + 4].copy_from_slice(&0u32.to_le_bytes());
    assert!(matches!(
        SectionList::from_bytes(registry(), bad_bone),
        Err(M3Error::Decode(DecodeError::UnexpectedValue { ref path, .. })) if path == "BONE.unknown0"
    ));

    // header model reference index lives at offset 16
    let mut dangling = bytes;
    dangling[16..20].copy_from_slice(&99u32.to_le_bytes());
    assert!(matches!(
        SectionList::from_bytes(registry(), dangling),
        Err(M3Error::Decode(DecodeError::DanglingReference { index: 99, len: 6, .. }))
    ));
}
