use std::path::{Path, PathBuf};

use spindle::error;
use spindle::error::{Chainable, Result};
use spindle::pipe::Pipe;
use spindle::plugins::*;
use spindle::reload::Reloader;
use spindle::server::DevServer;
use spindle::task::Registry;
use spindle::util::PathExt;
use spindle::watch::{WatchRule, Watcher};

use crate::config::Config;

/// What every task runs against.
#[derive(Debug, Clone)]
pub struct Context {
    pub root: PathBuf,
    pub config: Config,
    /// Set while the dev server runs: stylesheet tasks stream their output.
    pub reloader: Option<Reloader>,
}

impl Context {
    pub fn new(root: PathBuf, config: Config) -> Self {
        Context { root, config, reloader: None }
    }

    /// `pattern` under the source directory, as a root-relative glob.
    fn src(&self, pattern: &str) -> String {
        format!("{}/{pattern}", self.config.src.to_slash())
    }

    /// `dir` under the output directory, relative to the root.
    fn dist(&self, dir: &str) -> PathBuf {
        self.config.dist.join(dir)
    }

    pub fn src_dir(&self) -> PathBuf {
        self.root.join(&self.config.src)
    }

    pub fn dist_dir(&self) -> PathBuf {
        self.root.join(&self.config.dist)
    }

    fn stream_css(&self, written: &[PathBuf]) {
        if let Some(reloader) = &self.reloader {
            let dist = self.dist_dir();
            let paths = written.iter()
                .filter_map(|p| p.strip_prefix(&dist).ok())
                .map(Path::to_path_buf)
                .collect();

            reloader.stream_css(paths);
        }
    }
}

pub fn registry() -> Registry<Context> {
    let mut registry = Registry::new();
    registry
        .action("clean", clean)
        .action("styles-main", styles_main)
        .action("styles-vendor", styles_vendor)
        .action("html", html)
        .action("sprite", sprite)
        .action("scripts-main", scripts_main)
        .action("scripts-vendor", scripts_vendor)
        .action("fonts", fonts)
        .action("icons", icons)
        .action("images", images)
        .series("copy", ["fonts", "images", "icons"])
        .series("build", BUILD)
        .series("default", ["clean"].into_iter().chain(BUILD).chain(["server"]))
        .action("server", server);

    registry
}

const BUILD: [&str; 7] = [
    "styles-main",
    "styles-vendor",
    "scripts-main",
    "scripts-vendor",
    "sprite",
    "copy",
    "html",
];

fn clean(cx: &Context) -> Result<()> {
    let dist = cx.dist_dir();
    match std::fs::remove_dir_all(&dist) {
        Ok(()) => tracing::debug!(directory = %dist.display(), "removed output directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).chain_with(|| error! {
            "failed to remove output directory",
            "directory" => dist.display(),
        }),
    }

    Ok(())
}

fn styles_main(cx: &Context) -> Result<()> {
    let written = Pipe::src(&cx.root, [cx.src("sass/**/*.{scss,sass}")])?
        .pipe(Sass::new().log_errors())
        .pipe(Rename::default().suffix(".min").extname(".css"))
        .pipe(CleanCss)
        .dest(cx.dist("css"))?;

    cx.stream_css(&written);
    Ok(())
}

fn styles_vendor(cx: &Context) -> Result<()> {
    if cx.config.style_libs.is_empty() {
        tracing::info!("no style libraries configured");
        return Ok(());
    }

    let written = Pipe::src(&cx.root, &cx.config.style_libs)?
        .pipe(CleanCss)
        .pipe(Concat::new("vendor.min.css"))
        .dest(cx.dist("css"))?;

    cx.stream_css(&written);
    Ok(())
}

fn html(cx: &Context) -> Result<()> {
    let settings = &cx.config.html;
    let include = FileInclude::new(&cx.root)
        .prefix(&settings.prefix)
        .basepath(settings.basepath(&cx.root))
        .context(settings.context());

    Pipe::src(&cx.root, [cx.src("html/*.html"), cx.src("html/pages/**/*.html")])?
        .pipe(include)
        .pipe(Rename::default().flatten())
        .dest(cx.dist(""))?;

    Ok(())
}

fn sprite(cx: &Context) -> Result<()> {
    Pipe::src(&cx.root, [cx.src("img/icons/icons-sprite/**/*.svg")])?
        .pipe(SvgStore::inline())
        .pipe(Rename::to("sprite.svg"))
        .dest(cx.dist("img/icons"))?;

    Ok(())
}

fn scripts_main(cx: &Context) -> Result<()> {
    Pipe::src(&cx.root, [cx.src("js/**/*.js")])?
        .pipe(Transpile)
        .pipe(Uglify)
        .pipe(Concat::new("main.min.js"))
        .dest(cx.dist("js"))?;

    Ok(())
}

fn scripts_vendor(cx: &Context) -> Result<()> {
    if cx.config.js_libs.is_empty() {
        tracing::info!("no script libraries configured");
        return Ok(());
    }

    Pipe::src(&cx.root, &cx.config.js_libs)?
        .pipe(Uglify)
        .pipe(Concat::new("vendor.min.js"))
        .dest(cx.dist("js"))?;

    Ok(())
}

fn copy(cx: &Context, glob: &str, dest: &str) -> Result<()> {
    let written = Pipe::src(&cx.root, [cx.src(glob)])?.dest(cx.dist(dest))?;
    tracing::debug!(files = written.len(), "copied {glob}");
    Ok(())
}

fn fonts(cx: &Context) -> Result<()> {
    copy(cx, "fonts/**/*", "fonts")
}

fn icons(cx: &Context) -> Result<()> {
    copy(cx, "img/icons/**/*.svg", "img/icons")
}

fn images(cx: &Context) -> Result<()> {
    copy(cx, "img/images/**/*.{png,jpg,svg}", "img/images")
}

/// The watch rules of the dev server, in the order they are checked.
pub fn watch_rules(cx: &Context) -> Result<Vec<WatchRule>> {
    Ok(vec![
        WatchRule::new([cx.src("**/*.html")], ["html"], true)?,
        WatchRule::new([cx.src("sass/**/*.{scss,sass}")], ["styles-main"], false)?,
        WatchRule::new([cx.src("js/**/*.{js,json}")], ["scripts-main"], true)?,
        WatchRule::new([cx.src("img/**/*.svg")], ["icons", "html"], true)?,
        WatchRule::new([cx.src("img/**/*.{png,jpg}")], ["images", "html"], true)?,
    ])
}

fn server(cx: &Context) -> Result<()> {
    let settings = &cx.config.server;
    let reloader = Reloader::new();
    let live = Context { reloader: Some(reloader.clone()), ..cx.clone() };
    let on_change = {
        let (registry, reloader) = (registry(), reloader.clone());
        move |rule: &WatchRule| -> Result<()> {
            rule.series.iter().try_for_each(|task| registry.run(task, &live))?;
            if rule.reload {
                reloader.reload();
            }

            Ok(())
        }
    };

    let watcher = Watcher::spawn(
        &cx.root,
        &cx.src_dir(),
        watch_rules(cx)?,
        settings.watch_options(),
        on_change,
    )?;

    let result = DevServer::new(settings.server_config()).run(&cx.dist_dir(), reloader);
    watcher.stop();
    result
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn project() -> (tempfile::TempDir, Context) {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("src");
        for dir in ["sass/blocks", "js", "html/pages/about", "html/blocks", "img/icons/icons-sprite"] {
            fs::create_dir_all(src.join(dir)).unwrap();
        }

        fs::write(src.join("sass/_vars.scss"), "$accent: red;").unwrap();
        fs::write(src.join("sass/main.scss"), "@import 'vars';\nbody { p { color: $accent; } }").unwrap();
        fs::write(src.join("js/app.js"), "// app\nconst greet = (name) => `hi ${ name }`;\n").unwrap();
        fs::write(src.join("html/index.html"), "<title>@@test</title>@@include('src/html/blocks/nav.html')").unwrap();
        fs::write(src.join("html/blocks/nav.html"), "<nav></nav>").unwrap();
        fs::write(src.join("html/pages/about/team.html"), "<p>team</p>").unwrap();
        fs::write(src.join("img/icons/icons-sprite/star.svg"), "<svg viewBox=\"0 0 1 1\"><g/></svg>").unwrap();

        let cx = Context::new(root.path().to_path_buf(), Config::default());
        (root, cx)
    }

    #[test]
    fn build_writes_every_output() {
        let (root, cx) = project();
        registry().run("build", &cx).unwrap();

        let dist = root.path().join("dist");
        let read = |path: &str| fs::read_to_string(dist.join(path)).unwrap();
        assert_eq!(read("css/main.min.css"), "body p{color:red}");
        assert!(!dist.join("css/_vars.min.css").exists());
        assert_eq!(read("js/main.min.js"), "const greet=(name)=>`hi ${name}`;");
        assert_eq!(read("index.html"), "<title>text</title><nav></nav>");
        assert_eq!(read("team.html"), "<p>team</p>");
        assert!(!dist.join("blocks/nav.html").exists());
        assert_eq!(read("img/icons/sprite.svg"), "<svg xmlns=\"http://www.w3.org/2000/svg\">\
            <symbol id=\"star\" viewBox=\"0 0 1 1\"><g/></symbol></svg>");
        assert_eq!(read("img/icons/icons-sprite/star.svg"), "<svg viewBox=\"0 0 1 1\"><g/></svg>");
    }

    #[test]
    fn dot_prefixed_source_directory_builds() {
        let (root, mut cx) = project();
        cx.config.src = PathBuf::from("./src");
        registry().run("scripts-main", &cx).unwrap();
        registry().run("html", &cx).unwrap();

        let dist = root.path().join("dist");
        assert!(dist.join("js/main.min.js").is_file());
        assert!(dist.join("team.html").is_file());
        assert!(watch_rules(&cx).unwrap()[0].matches(&[PathBuf::from("src/html/index.html")]));
    }

    #[test]
    fn clean_removes_the_output_directory() {
        let (root, cx) = project();
        fs::create_dir_all(root.path().join("dist/css")).unwrap();
        registry().run("clean", &cx).unwrap();
        assert!(!root.path().join("dist").exists());
        registry().run("clean", &cx).unwrap();
    }

    #[test]
    fn default_starts_clean_and_ends_serving() {
        let registry = registry();
        let default = registry.describe("default").unwrap();
        assert!(default.starts_with("series: clean, styles-main"), "{default}");
        assert!(default.ends_with("copy, html, server"), "{default}");
        assert_eq!(registry.describe("copy").as_deref(), Some("series: fonts, images, icons"));
    }

    #[test]
    fn watch_rules_map_sources_to_series() {
        let (_root, cx) = project();
        let rules = watch_rules(&cx).unwrap();
        let fired = |path: &str| -> Vec<String> {
            rules.iter()
                .filter(|rule| rule.matches(&[PathBuf::from(path)]))
                .flat_map(|rule| rule.series.clone())
                .collect()
        };

        assert_eq!(fired("src/html/pages/about.html"), ["html"]);
        assert_eq!(fired("src/sass/blocks/_nav.sass"), ["styles-main"]);
        assert_eq!(fired("src/js/data/items.json"), ["scripts-main"]);
        assert_eq!(fired("src/img/icons/star.svg"), ["icons", "html"]);
        assert_eq!(fired("src/img/images/a.jpg"), ["images", "html"]);
        assert!(fired("src/fonts/a.woff2").is_empty());
    }

    #[test]
    fn css_is_streamed_relative_to_dist() {
        let (root, mut cx) = project();
        let reloader = Reloader::new();
        let mut events = reloader.subscribe();
        cx.reloader = Some(reloader);

        registry().run("styles-main", &cx).unwrap();
        match events.try_recv().unwrap() {
            spindle::reload::ReloadEvent::Css(paths) => assert_eq!(paths, [PathBuf::from("css/main.min.css")]),
            event => panic!("unexpected event: {event:?}"),
        }

        assert!(root.path().join("dist/css/main.min.css").exists());
    }
}
