//! Commit and branch persistence: ref files, read-back, forking, prefixes.

use assert_fs::TempDir;
use assert_fs::prelude::PathCreateDir;
use assert_fs::fixture::PathChild;
use pretty_assertions::assert_eq;
use std::path::Path;
use twig::areas::repository::Repository;
use twig::errors::ModelError;
use twig::objects::commit::{Author, Commit};
use twig::objects::entry_mode::EntryMode;
use twig::objects::object::Object;

fn init_repo() -> (TempDir, Repository) {
    let dir = TempDir::new().unwrap();
    let repo = Repository::new(dir.path()).unwrap();
    repo.init().unwrap();
    (dir, repo)
}

fn fixed_author() -> Author {
    Author::new_with_timestamp(
        "Jane Doe".to_string(),
        "jane@example.com".to_string(),
        chrono::DateTime::parse_from_rfc3339("2024-05-01T12:00:00+02:00").unwrap(),
    )
}

#[test]
fn branch_update_round_trips_through_the_store() {
    let (dir, repo) = init_repo();

    let commit = repo.create_commit();
    {
        let mut commit = commit.borrow_mut();
        commit.set_author(fixed_author());
        commit.set_message("initial import");
    }

    let readme = repo
        .create_blob("README", "hello".to_string(), EntryMode::Regular)
        .unwrap();
    let readme_oid = readme.oid().clone();
    let main = repo
        .create_blob("main", "fn main() {}".to_string(), EntryMode::Regular)
        .unwrap();
    let main_oid = main.oid().clone();

    commit
        .borrow_mut()
        .update(&repo, "README", Object::Blob(readme))
        .unwrap();
    commit
        .borrow_mut()
        .update(&repo, "src/main", Object::Blob(main))
        .unwrap();

    let mut branch = repo.create_branch("main").unwrap();
    branch.update(&repo, commit.clone()).unwrap();

    let commit_oid = commit.borrow().oid().cloned().unwrap();

    // The ref file holds exactly the commit's textual identity.
    let ref_content = std::fs::read_to_string(
        dir.path().join(".git").join("refs").join("heads").join("main"),
    )
    .unwrap();
    assert_eq!(ref_content, commit_oid.to_string());
    assert_eq!(
        repo.refs()
            .read_ref_file(Path::new("refs/heads/main"))
            .unwrap(),
        Some(commit_oid.clone())
    );

    // Reading the commit back resolves exactly the written paths; the tree
    // itself stays unloaded.
    let reread = repo.read_commit(&commit_oid).unwrap();
    assert!(reread.borrow().tree().is_none());
    assert_eq!(reread.borrow().message(), "initial import");

    let tree_oid = reread.borrow().tree_oid().cloned().unwrap();
    let db = repo.database();

    let readme_entry = db.entry_at(&tree_oid, "README").unwrap().unwrap();
    assert_eq!(readme_entry.oid(), Some(&readme_oid));

    let main_entry = db.entry_at(&tree_oid, "src/main").unwrap().unwrap();
    assert_eq!(main_entry.oid(), Some(&main_oid));

    let readme_data = db.parse_blob(&readme_oid).unwrap().unwrap();
    assert_eq!(&readme_data.0[..], b"hello");

    let src_entry = db.entry_at(&tree_oid, "src").unwrap().unwrap();
    assert!(src_entry.mode().is_directory());

    assert!(db.entry_at(&tree_oid, "missing").unwrap().is_none());
    assert!(db.entry_at(&tree_oid, "README/below").unwrap().is_none());
}

#[test]
fn forked_commit_records_its_parent_and_shares_the_tree() {
    let (_dir, repo) = init_repo();

    let first = repo.create_commit();
    first.borrow_mut().set_author(fixed_author());
    let blob = repo
        .create_blob("base.txt", "base".to_string(), EntryMode::Regular)
        .unwrap();
    first
        .borrow_mut()
        .update(&repo, "base.txt", Object::Blob(blob))
        .unwrap();
    first.borrow_mut().write(repo.database()).unwrap();
    let first_oid = first.borrow().oid().cloned().unwrap();

    let second = Commit::fork(&first, &repo);
    second.borrow_mut().set_author(fixed_author());
    let blob = repo
        .create_blob("next.txt", "next".to_string(), EntryMode::Regular)
        .unwrap();
    second
        .borrow_mut()
        .update(&repo, "next.txt", Object::Blob(blob))
        .unwrap();
    second.borrow_mut().write(repo.database()).unwrap();
    let second_oid = second.borrow().oid().cloned().unwrap();

    let image = repo.database().parse_commit(&second_oid).unwrap().unwrap();
    assert_eq!(image.parent_oids, vec![first_oid]);

    // The fork shares the tree: both handles see the added entry.
    assert!(first.borrow().tree().unwrap().borrow().lookup("next.txt").is_some());

    let tree_oid = second.borrow().tree_oid().cloned().unwrap();
    assert!(repo.database().entry_at(&tree_oid, "base.txt").unwrap().is_some());
    assert!(repo.database().entry_at(&tree_oid, "next.txt").unwrap().is_some());
}

#[test]
fn prefix_narrows_the_committed_root() {
    let (_dir, repo) = init_repo();

    let commit = repo.create_commit();
    commit.borrow_mut().set_author(fixed_author());
    commit.borrow_mut().set_prefix("src");

    let blob = repo
        .create_blob("main", "fn main() {}".to_string(), EntryMode::Regular)
        .unwrap();
    commit
        .borrow_mut()
        .update(&repo, "src/main", Object::Blob(blob))
        .unwrap();
    commit.borrow_mut().write(repo.database()).unwrap();

    // The committed tree is the subtree itself: `main` sits at its root.
    let tree_oid = commit.borrow().tree_oid().cloned().unwrap();
    assert!(repo.database().entry_at(&tree_oid, "main").unwrap().is_some());
    assert!(repo.database().entry_at(&tree_oid, "src/main").unwrap().is_none());
}

#[test]
fn commit_write_requires_a_resolvable_non_empty_tree() {
    let (_dir, repo) = init_repo();

    // No tree at all.
    let bare = repo.create_commit();
    let err = bare.borrow_mut().write(repo.database()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ModelError>(),
        Some(ModelError::Contract(_))
    ));

    // A tree emptied before the write.
    let emptied = repo.create_commit();
    let blob = repo
        .create_blob("gone.txt", "x".to_string(), EntryMode::Regular)
        .unwrap();
    emptied
        .borrow_mut()
        .update(&repo, "gone.txt", Object::Blob(blob))
        .unwrap();
    assert!(emptied.borrow_mut().remove("gone.txt").unwrap());
    let err = emptied.borrow_mut().write(repo.database()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ModelError>(),
        Some(ModelError::Contract(_))
    ));

    // A prefix that does not resolve to a tree.
    let misprefixed = repo.create_commit();
    let blob = repo
        .create_blob("file.txt", "x".to_string(), EntryMode::Regular)
        .unwrap();
    misprefixed
        .borrow_mut()
        .update(&repo, "file.txt", Object::Blob(blob))
        .unwrap();
    misprefixed.borrow_mut().set_prefix("nope");
    let err = misprefixed.borrow_mut().write(repo.database()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ModelError>(),
        Some(ModelError::Contract(_))
    ));
}

#[test]
fn ref_write_refuses_non_regular_file_collisions() {
    let (dir, repo) = init_repo();

    // Occupy the ref path with a directory.
    dir.child(".git/refs/heads/feature").create_dir_all().unwrap();

    let commit = repo.create_commit();
    commit.borrow_mut().set_author(fixed_author());
    let blob = repo
        .create_blob("a.txt", "a".to_string(), EntryMode::Regular)
        .unwrap();
    commit
        .borrow_mut()
        .update(&repo, "a.txt", Object::Blob(blob))
        .unwrap();

    let mut branch = repo.create_branch("feature").unwrap();
    assert!(branch.update(&repo, commit).is_err());
}
