//! Unit tests for core Mangaman functionality.
//!
//! Tests natural ordering, the page editor and configuration in isolation, without touching
//! the filesystem.

use mangaman::editor::padding_width;
use mangaman::error::{Error, Result};
use mangaman::natural::{compare_names, compare_optional, compare_stems, sort_names};
use mangaman::prelude::*;
use mangaman::tree::TreeBuilder;
use std::cmp::Ordering;

mod common;

fn editor_from_entries(entries: &[&str]) -> PageEditor {
    let mut builder = TreeBuilder::new("");
    for entry in entries {
        builder.add_container_entry(entry);
    }
    PageEditor::from_tree(&builder.build())
}

fn page_names(editor: &PageEditor, folder: FolderId) -> Vec<String> {
    editor
        .elements(folder)
        .iter()
        .filter_map(|e| e.name().map(str::to_string))
        .collect()
}

fn page_ids(editor: &PageEditor, folder: FolderId) -> Vec<PageId> {
    editor
        .elements(folder)
        .iter()
        .filter_map(Element::page_id)
        .collect()
}

#[test]
fn test_natural_order_ignores_zero_padding() {
    assert_eq!(compare_names("2.jpg", "10.jpg"), Ordering::Less);
    assert_eq!(compare_names("002.jpg", "010.jpg"), Ordering::Less);
    assert_eq!(compare_names("010.jpg", "9.jpg"), Ordering::Greater);
    assert_ne!(compare_names("page_7.png", "page_07.png"), Ordering::Equal);
    assert_eq!(compare_names("cover.jpg", "intro.jpg"), Ordering::Less);
}

#[test]
fn test_natural_order_huge_numbers_do_not_overflow() {
    let small = "99999999999999999999999999.jpg";
    let large = "100000000000000000000000000.jpg";
    assert_eq!(compare_names(small, large), Ordering::Less);
    assert_eq!(compare_names(large, small), Ordering::Greater);
}

#[test]
fn test_natural_order_missing_values_sort_last() {
    assert_eq!(compare_optional(None, Some("1.jpg")), Ordering::Greater);
    assert_eq!(compare_optional(Some("1.jpg"), None), Ordering::Less);
    assert_eq!(compare_optional(None, None), Ordering::Equal);
}

#[test]
fn test_sort_names_and_stems() {
    let mut names: Vec<String> = ["10.jpg", "2.jpg", "1.jpg", "cover.jpg"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    sort_names(&mut names);
    assert_eq!(&names[..3], &["1.jpg", "2.jpg", "10.jpg"]);

    assert_eq!(compare_stems("p3.png", "p10.jpg"), Ordering::Less);
    assert_eq!(compare_stems("Vol 2", "Vol 10"), Ordering::Less);
}

#[test]
fn test_padding_width() {
    assert_eq!(padding_width(0), 1);
    assert_eq!(padding_width(1), 1);
    assert_eq!(padding_width(10), 1);
    assert_eq!(padding_width(11), 2);
    assert_eq!(padding_width(12), 2);
    assert_eq!(padding_width(100), 2);
    assert_eq!(padding_width(101), 3);
}

#[test]
fn test_from_tree_puts_folders_before_files() {
    let editor = editor_from_entries(&["2.jpg", "extra/1.jpg", "1.jpg"]);
    let root = editor.elements(editor.root());
    assert_eq!(root.len(), 3);
    let Element::Folder(extra) = root[0] else {
        panic!("first element should be a folder");
    };
    assert_eq!(editor.folder(extra).unwrap().name, "extra");
    assert_eq!(editor.folder_path(extra), "extra");
    assert_eq!(page_names(&editor, editor.root()), vec!["1.jpg", "2.jpg"]);
}

#[test]
fn test_join_then_split_restores_pages() -> Result<()> {
    let mut editor = editor_from_entries(&["1.jpg", "2.jpg", "3.jpg"]);
    let root = editor.root();
    let before = editor.elements(root).to_vec();
    let ids = page_ids(&editor, root);

    let joined = editor.join(ids[0], ids[1])?;
    assert_eq!(editor.elements(root).len(), 2);
    match editor.page(joined) {
        Some(Element::Joined(pair)) => {
            assert_eq!(pair.name, "1.jpg");
            assert_eq!(pair.left.id, ids[0]);
            assert_eq!(pair.right.id, ids[1]);
        }
        other => panic!("expected a joined page, got {:?}", other),
    }
    assert_eq!(editor.folder_of(ids[0]), None);

    let (left, right) = editor.split(joined)?;
    assert_eq!((left, right), (ids[0], ids[1]));
    assert_eq!(editor.elements(root), &before[..]);
    assert_eq!(editor.folder_of(ids[0]), Some(root));
    Ok(())
}

#[test]
fn test_split_restores_deleted_state_of_pair() -> Result<()> {
    let mut editor = editor_from_entries(&["1.jpg", "2.jpg"]);
    let ids = page_ids(&editor, editor.root());

    let joined = editor.join(ids[0], ids[1])?;
    assert!(editor.toggle_delete(joined)?);
    let (left, right) = editor.split(joined)?;

    assert!(editor.page(left).unwrap().is_deleted());
    assert!(editor.page(right).unwrap().is_deleted());
    Ok(())
}

#[test]
fn test_toggle_delete_on_joined_cascades() -> Result<()> {
    let mut editor = editor_from_entries(&["1.jpg", "2.jpg"]);
    let ids = page_ids(&editor, editor.root());
    let joined = editor.join(ids[0], ids[1])?;

    editor.toggle_delete(joined)?;
    match editor.page(joined) {
        Some(Element::Joined(pair)) => {
            assert!(pair.deleted && pair.left.deleted && pair.right.deleted);
        }
        other => panic!("expected a joined page, got {:?}", other),
    }
    assert!(!editor.toggle_delete(joined)?);
    Ok(())
}

#[test]
fn test_join_rejects_ineligible_operands() -> Result<()> {
    let mut editor = editor_from_entries(&["a/1.jpg", "b/2.jpg", "3.jpg", "4.jpg"]);
    let root = editor.root();
    let folders: Vec<FolderId> = editor
        .elements(root)
        .iter()
        .filter_map(|e| match e {
            Element::Folder(id) => Some(*id),
            _ => None,
        })
        .collect();
    let in_a = page_ids(&editor, folders[0])[0];
    let in_b = page_ids(&editor, folders[1])[0];

    // different folders
    assert!(!editor.can_join(in_a, in_b));
    assert!(matches!(
        editor.join(in_a, in_b),
        Err(Error::InvalidOperation(_))
    ));

    // same page twice
    let ids = page_ids(&editor, root);
    assert!(matches!(
        editor.join(ids[0], ids[0]),
        Err(Error::InvalidOperation(_))
    ));

    // deleted operand
    editor.toggle_delete(ids[1])?;
    assert!(matches!(
        editor.join(ids[0], ids[1]),
        Err(Error::InvalidOperation(_))
    ));

    // splitting a single page
    assert!(matches!(
        editor.split(ids[0]),
        Err(Error::InvalidOperation(_))
    ));
    assert_eq!(editor.elements(root).len(), 4);
    Ok(())
}

#[test]
fn test_join_with_next_skips_deleted_pages() -> Result<()> {
    let mut editor = editor_from_entries(&["1.jpg", "2.jpg", "3.jpg"]);
    let ids = page_ids(&editor, editor.root());

    editor.toggle_delete(ids[1])?;
    assert_eq!(editor.next_joinable(ids[0]), Some(ids[2]));
    assert_eq!(editor.previous_joinable(ids[2]), Some(ids[0]));
    assert_eq!(editor.previous_joinable(ids[0]), None);

    let joined = editor.join_with_next(ids[0])?;
    assert_eq!(
        page_names(&editor, editor.root()),
        vec!["1.jpg".to_string(), "2.jpg".to_string()]
    );
    match editor.page(joined) {
        Some(Element::Joined(pair)) => assert_eq!(pair.right.id, ids[2]),
        other => panic!("expected a joined page, got {:?}", other),
    }
    assert!(editor.join_with_previous(ids[1]).is_err());
    Ok(())
}

#[test]
fn test_swap_sides_and_rename() -> Result<()> {
    let mut editor = editor_from_entries(&["1.jpg", "2.jpg", "sub/3.jpg"]);
    let ids = page_ids(&editor, editor.root());
    let joined = editor.join(ids[0], ids[1])?;

    editor.swap_sides(joined)?;
    match editor.page(joined) {
        Some(Element::Joined(pair)) => {
            assert_eq!(pair.left.id, ids[1]);
            assert_eq!(pair.right.id, ids[0]);
        }
        other => panic!("expected a joined page, got {:?}", other),
    }

    editor.rename(joined, "spread.png")?;
    assert_eq!(editor.page(joined).and_then(Element::name), Some("spread.png"));
    assert!(matches!(
        editor.rename(joined, "a/b.png"),
        Err(Error::InvalidOperation(_))
    ));
    assert!(editor.rename(joined, "").is_err());

    let Element::Folder(sub) = editor.elements(editor.root())[0] else {
        panic!("first element should be a folder");
    };
    editor.rename_folder(sub, "extras")?;
    assert_eq!(editor.folder_path(sub), "extras");
    assert!(editor.rename_folder(editor.root(), "root").is_err());
    Ok(())
}

#[test]
fn test_rename_rejects_sibling_names() -> Result<()> {
    let mut editor = editor_from_entries(&["1.jpg", "2.jpg", "3.jpg", "sub/4.jpg", "other/5.jpg"]);
    let root = editor.root();
    let ids = page_ids(&editor, root);

    assert!(matches!(
        editor.rename(ids[0], "2.jpg"),
        Err(Error::InvalidOperation(_))
    ));
    assert!(matches!(
        editor.rename(ids[0], "sub"),
        Err(Error::InvalidOperation(_))
    ));
    assert_eq!(page_names(&editor, root), vec!["1.jpg", "2.jpg", "3.jpg"]);

    // Renaming to its own name and taking a deleted page's name are fine
    editor.rename(ids[0], "1.jpg")?;
    editor.toggle_delete(ids[2])?;
    editor.rename(ids[0], "3.jpg")?;

    let folders: Vec<FolderId> = editor
        .elements(root)
        .iter()
        .filter_map(|e| match e {
            Element::Folder(id) => Some(*id),
            _ => None,
        })
        .collect();
    assert!(matches!(
        editor.rename_folder(folders[0], "sub"),
        Err(Error::InvalidOperation(_))
    ));
    assert!(matches!(
        editor.rename_folder(folders[0], "2.jpg"),
        Err(Error::InvalidOperation(_))
    ));
    editor.rename_folder(folders[0], "extras")?;
    Ok(())
}

#[test]
fn test_rename_and_renumber_twelve_pages() -> Result<()> {
    let mut entries: Vec<String> = (1..=12)
        .rev()
        .map(|i| {
            if i == 3 {
                format!("p{}.png", i)
            } else {
                format!("p{}.jpg", i)
            }
        })
        .collect();
    entries.push("notes.txt".to_string());
    entries.push("bonus/1.jpg".to_string());
    let refs: Vec<&str> = entries.iter().map(String::as_str).collect();
    let mut editor = editor_from_entries(&refs);
    let root = editor.root();

    editor.rename_and_renumber(root)?;

    let elements = editor.elements(root);
    assert!(matches!(elements[0], Element::Folder(_)));
    let names = page_names(&editor, root);
    let images: Vec<&String> = names.iter().filter(|n| n.as_str() != "notes.txt").collect();
    let expected: Vec<String> = (0..12)
        .map(|i| {
            if i == 2 {
                format!("{:02}.png", i)
            } else {
                format!("{:02}.jpg", i)
            }
        })
        .collect();
    assert_eq!(images, expected.iter().collect::<Vec<_>>());
    assert!(names.contains(&"notes.txt".to_string()));

    // the nested folder is left as it was
    let Element::Folder(bonus) = elements[0] else {
        unreachable!()
    };
    assert_eq!(page_names(&editor, bonus), vec!["1.jpg".to_string()]);
    Ok(())
}

#[test]
fn test_rename_and_renumber_names_joined_pages() -> Result<()> {
    let mut editor = editor_from_entries(&["1.jpg", "2.jpg", "3.jpg"]);
    let root = editor.root();
    let ids = page_ids(&editor, root);
    editor.join(ids[1], ids[2])?;

    editor.rename_and_renumber(root)?;
    assert_eq!(page_names(&editor, root), vec!["0.jpg", "1.jpg"]);
    Ok(())
}

#[test]
fn test_rename_and_renumber_empty_folder() -> Result<()> {
    let mut editor = editor_from_entries(&[]);
    let root = editor.root();
    editor.rename_and_renumber(root)?;
    assert!(editor.elements(root).is_empty());
    Ok(())
}

#[test]
fn test_images_lists_depth_first() -> Result<()> {
    let mut editor = editor_from_entries(&["ch1/1.jpg", "ch1/2.jpg", "cover.jpg", "info.txt"]);
    let root = editor.root();
    let top = page_ids(&editor, root);

    let Element::Folder(ch1) = editor.elements(root)[0] else {
        panic!("first element should be a folder");
    };
    let nested = page_ids(&editor, ch1);
    editor.join(nested[0], nested[1])?;

    let images = editor.images();
    assert_eq!(images.len(), 2);
    assert!(matches!(images[0], Element::Joined(_)));
    assert_eq!(images[1].page_id(), Some(top[0]));
    Ok(())
}

#[test]
fn test_library_config_builder_validation() {
    let result = LibraryConfig::builder().temp_suffix("a\\b").build();
    assert!(result.is_err());
    assert!(
        result
            .unwrap_err()
            .to_string()
            .contains("must not contain a path separator")
    );

    let config = LibraryConfig::builder()
        .zip_compression(ZipCompression::Stored)
        .skip_hidden(false)
        .build()
        .unwrap();
    assert_eq!(config.zip_compression, ZipCompression::Stored);
    assert!(!config.skip_hidden);
}
