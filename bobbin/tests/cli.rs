use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn bobbin(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bobbin"))
        .arg("-C")
        .arg(root)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn site() -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    let path = |p: &str| {
        let path = root.path().join(p);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        path
    };

    fs::write(path("spindle.toml"), r#"
        STYLE_LIBS = ["node_modules/normalize/normalize.css"]
        JS_LIBS = ["node_modules/lib/b.js", "node_modules/lib/a.js"]

        [html]
        context = { test = "text", title = "Bobbin" }
    "#).unwrap();

    fs::write(path("node_modules/normalize/normalize.css"), "/*! normalize */\nhtml {\n  line-height: 1.15;\n}\n").unwrap();
    fs::write(path("node_modules/lib/a.js"), "/* a */\nwindow.a = function () { return 'a'; };\n").unwrap();
    fs::write(path("node_modules/lib/b.js"), "window.b = 2 / 1;\n").unwrap();

    fs::write(path("src/sass/main.scss"), "@use 'blocks/header';\n.page { margin: 0 auto; }\n").unwrap();
    fs::write(path("src/sass/blocks/_header.scss"), ".header { .logo { width: 10px; } }\n").unwrap();
    fs::write(path("src/sass/broken.scss"), ".a { color: \n").unwrap();
    fs::write(path("src/js/main.js"), "// entry\nlet a = 1\nlet b = a\n").unwrap();
    fs::write(path("src/js/menu.js"), "const re = /[/]+/g;\n").unwrap();
    fs::write(path("src/html/index.html"), "<html><head><title>@@title</title></head>\
        <body>@@include('src/html/blocks/footer.html', {\"year\": 2024})</body></html>").unwrap();
    fs::write(path("src/html/blocks/footer.html"), "<footer>@@test @@year</footer>").unwrap();
    fs::write(path("src/html/pages/contacts/contacts.html"), "<p>contacts</p>").unwrap();
    fs::write(path("src/img/icons/icons-sprite/mail.svg"), "<svg viewBox=\"0 0 24 24\"><path d=\"M0 0\"/></svg>").unwrap();
    fs::write(path("src/img/icons/arrow.svg"), "<svg/>").unwrap();
    fs::write(path("src/img/images/photo.jpg"), [0xff, 0xd8, 0xff, 0x00, 0x10]).unwrap();
    fs::write(path("src/fonts/inter.woff2"), [0x77, 0x4f, 0x46, 0x32, 0x00]).unwrap();
    root
}

fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files = vec![];
    let mut stack = vec![dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push((path.display().to_string(), fs::read(&path).unwrap()));
            }
        }
    }

    files.sort();
    files
}

#[test]
fn build_is_complete_and_deterministic() {
    let root = site();
    let output = bobbin(root.path(), &["build"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let dist = root.path().join("dist");
    let read = |p: &str| fs::read_to_string(dist.join(p)).unwrap();
    assert_eq!(read("css/main.min.css"), ".header .logo{width:10px}.page{margin:0 auto}");
    assert!(!dist.join("css/broken.min.css").exists());
    assert!(read("css/vendor.min.css").starts_with("/*! normalize */"));
    assert_eq!(read("js/main.min.js"), "let a=1\nlet b=a\nconst re=/[/]+/g;");
    assert_eq!(read("js/vendor.min.js"), "window.b=2/1;\nwindow.a=function(){return'a';};");
    assert_eq!(read("index.html"), "<html><head><title>Bobbin</title></head>\
        <body><footer>text 2024</footer></body></html>");
    assert_eq!(read("contacts.html"), "<p>contacts</p>");
    assert!(read("img/icons/sprite.svg").contains("<symbol id=\"mail\" viewBox=\"0 0 24 24\">"));
    assert!(dist.join("img/icons/arrow.svg").exists());
    assert_eq!(fs::read(dist.join("img/images/photo.jpg")).unwrap(), [0xff, 0xd8, 0xff, 0x00, 0x10]);
    assert_eq!(fs::read(dist.join("fonts/inter.woff2")).unwrap(), [0x77, 0x4f, 0x46, 0x32, 0x00]);

    let first = snapshot(&dist);
    let output = bobbin(root.path(), &["clean", "build"]);
    assert!(output.status.success());
    assert_eq!(first, snapshot(&dist));
}

#[test]
fn clean_removes_dist() {
    let root = site();
    assert!(bobbin(root.path(), &["copy"]).status.success());
    assert!(root.path().join("dist/fonts/inter.woff2").exists());

    assert!(bobbin(root.path(), &["clean"]).status.success());
    assert!(!root.path().join("dist").exists());
}

#[test]
fn list_and_failures() {
    let root = site();
    let output = bobbin(root.path(), &["--list"]);
    let listing = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(listing.contains("styles-main"));
    assert!(listing.contains("series: fonts, images, icons"));

    let output = bobbin(root.path(), &["deploy"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown task"));

    let output = bobbin(root.path(), &["--frobnicate"]);
    assert_eq!(output.status.code(), Some(2));
}
