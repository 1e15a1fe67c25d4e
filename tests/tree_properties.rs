use ali_lib::{keypath, vos, AliError, CodeSnippet, Fields, Mode, Resolver, Tree};

fn tree_with(paths: &[&str]) -> Tree {
    let mut tree = Tree::default();
    for path in paths {
        tree.add_command(path, Fields::default()).expect("add_command");
    }
    tree
}

#[test]
fn test_path_round_trip() {
    for path in ["one", "one.two", "one.two.three", "a-b.c_d.e+f"] {
        assert_eq!(keypath::join(&keypath::split(path)), path);
    }
    assert_eq!(keypath::split("a.b.c"), vos!["a", "b", "c"]);
    assert!(keypath::split("").is_empty());
}

#[test]
fn test_positional_helpers_clamp() {
    assert_eq!(keypath::segment_at("a.b.c", 1), "b");
    assert_eq!(keypath::segment_at("a.b.c", 99), "c");
    assert_eq!(keypath::segment_at("", 0), "");
    assert_eq!(keypath::drop_first("a.b.c", 1), "b.c");
    assert_eq!(keypath::drop_first("a.b.c", 7), "");
    assert_eq!(keypath::drop_last("a.b.c", 2), "a");
    assert_eq!(keypath::drop_last("a.b.c", 3), "");
}

#[test]
fn test_add_is_idempotent() {
    let mut tree = tree_with(&["a.b.c"]);
    let before = tree.len();
    tree.add_command("a.b.c", Fields::default()).unwrap();
    assert_eq!(tree.len(), before);
}

#[test]
fn test_ancestors_are_reused() {
    let tree = tree_with(&["a.b.c", "a.b.d"]);
    assert_eq!(tree.len(), 4);
    let b = tree.find("a.b").unwrap();
    assert_eq!(tree.get(tree.find("a.b.c").unwrap()).unwrap().parent, Some(b));
    assert_eq!(tree.get(tree.find("a.b.d").unwrap()).unwrap().parent, Some(b));
}

#[test]
fn test_key_path_matches_ancestry() {
    let tree = tree_with(&["x.y.z", "x.w"]);
    for path in ["x", "x.y", "x.y.z", "x.w"] {
        let id = tree.find(path).unwrap();
        assert_eq!(tree.key_path(id), path);
        let node = tree.get(id).unwrap();
        match node.parent {
            Some(parent) => assert_eq!(tree.key_path(id), format!("{}.{}", tree.key_path(parent), node.name)),
            None => assert_eq!(tree.key_path(id), node.name),
        }
    }
}

#[test]
fn test_remove_detaches_subtree() {
    let mut tree = tree_with(&["a.b.c", "a.b.d", "a.e"]);
    let c = tree.find("a.b.c").unwrap();

    assert_eq!(tree.remove_command("a.b").unwrap(), 3);
    assert!(tree.find("a.b").is_none());
    assert!(tree.find("a.b.c").is_none());
    assert!(tree.get(c).is_none());
    assert_eq!(tree.len(), 2);

    assert!(matches!(tree.remove_command("a.b"), Err(AliError::NotFound { .. })));
}

#[test]
fn test_substitution_shadowing() {
    let mut tree = tree_with(&["x.y", "x.z"]);
    tree.add_substitution("x", "env", "V1").unwrap();
    tree.add_substitution("x.y", "env", "V2").unwrap();
    let resolver = Resolver::new(&tree, false);

    assert_eq!(resolver.resolve(tree.find("x.y").unwrap(), &["env"]), "sh -c x y V2");
    assert_eq!(resolver.resolve(tree.find("x.z").unwrap(), &["env"]), "sh -c x z V1");
}

#[test]
fn test_execution_composition() {
    let tree = tree_with(&["one.two.three"]);
    let resolver = Resolver::new(&tree, false);
    let three = tree.find("one.two.three").unwrap();
    assert_eq!(resolver.resolve(three, &["arg1", "arg2"]), "sh -c one two three arg1 arg2");

    let no_args: &[&str] = &[];
    assert_eq!(resolver.resolve(tree.find("one").unwrap(), no_args), "sh -c one");
}

#[test]
fn test_modes_and_code() {
    let mut tree = tree_with(&["docker"]);
    tree.add_command(
        "docker.clean",
        Fields {
            code: Some(CodeSnippet::shell("docker system prune -af")),
            mode: Some(Mode::Exclusive),
            ..Fields::default()
        },
    )
    .unwrap();
    tree.add_command("docker.ps", Fields::default()).unwrap();
    let resolver = Resolver::new(&tree, false);

    assert_eq!(
        resolver.resolve(tree.find("docker.clean").unwrap(), &["--volumes"]),
        "sh -c docker system prune -af --volumes"
    );
    assert_eq!(resolver.resolve(tree.find("docker.ps").unwrap(), &["-a"]), "sh -c docker ps -a");
}

#[test]
fn test_shortest_key_path() {
    let tree = tree_with(&["git.remote.add"]);
    assert_eq!(tree.shortest_key_path("git.remote.add.origin"), "git.remote.add");
    assert_eq!(tree.shortest_key_path("git.log"), "git");
    assert_eq!(tree.shortest_key_path("svn.log"), "");
}

#[test]
fn test_sibling_names_and_aliases_are_unique() {
    let mut tree = Tree::default();
    tree.add_command("g", Fields { alias: "x".into(), ..Fields::default() }).unwrap();

    let clash = tree.add_command("git", Fields { alias: "g".into(), ..Fields::default() });
    assert!(matches!(clash, Err(AliError::DuplicateAlias { .. })));

    let roots: Vec<(String, String)> = tree
        .roots()
        .into_iter()
        .filter_map(|id| tree.get(id))
        .map(|node| (node.name.clone(), node.alias.clone()))
        .collect();
    assert_eq!(roots, vec![("g".to_string(), "x".to_string())]);

    // the same alias under another parent is its own scope
    tree.add_command("tools.git", Fields { alias: "g".into(), ..Fields::default() }).unwrap();
    assert_eq!(tree.key_path(tree.find("tools.g").unwrap()), "tools.git");
}
