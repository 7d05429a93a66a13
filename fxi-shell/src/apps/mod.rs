//! Bundled applications and the catalog the shell opens them from.

mod images;
mod main_app;
mod reader;
mod testapp;

use std::sync::Arc;

use fxi_kernel::{AppEnv, Application, CommandRegistry};
use indexmap::IndexMap;

use crate::settings::ShellSettings;

/// What an application module gets to know about its host.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub settings: ShellSettings,
    /// Names of every application the shell can open.
    pub available: Vec<String>,
}

/// An application the shell knows how to build.
pub trait AppModule: Send + Sync {
    /// Catalog name, also the application title.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// The command table of a new instance.
    fn commands(&self, ctx: &AppContext) -> CommandRegistry;

    /// Runs once, right after construction.
    fn init(&self, _app: &Arc<Application>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Initial tab content.
    fn render(&self, app: &Arc<Application>) {
        app.heading(app.title());
    }
}

/// Build, initialize and render a fresh instance of `module`.
pub fn launch(
    module: &dyn AppModule,
    env: AppEnv,
    ctx: &AppContext,
) -> anyhow::Result<Arc<Application>> {
    let app = Application::new(module.name(), env, module.commands(ctx));
    if let Err(e) = module.init(&app) {
        app.quit();
        return Err(e.context(format!("{}: init failed", module.name())));
    }
    module.render(&app);
    Ok(app)
}

/// Name to module mapping, in registration order.
#[derive(Clone, Default)]
pub struct Catalog {
    modules: IndexMap<&'static str, Arc<dyn AppModule>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every application shipped with the shell.
    pub fn bundled() -> Self {
        let mut catalog = Self::new();
        catalog.register(main_app::MainApp);
        catalog.register(testapp::TestApp);
        catalog.register(reader::Reader);
        catalog.register(images::Images);
        catalog
    }

    pub fn register(&mut self, module: impl AppModule + 'static) -> &mut Self {
        self.modules.insert(module.name(), Arc::new(module));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AppModule>> {
        self.modules.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.modules.keys().map(|name| name.to_string()).collect()
    }
}


#[cfg(test)]
mod tests {
    use super::test_env::{context, env};
    use super::*;

    struct Broken;

    impl AppModule for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn description(&self) -> &'static str {
            "Fails to initialize"
        }

        fn commands(&self, _ctx: &AppContext) -> CommandRegistry {
            CommandRegistry::new()
        }

        fn init(&self, _app: &Arc<Application>) -> anyhow::Result<()> {
            anyhow::bail!("no backend")
        }
    }

    #[test]
    fn test_bundled_catalog_order() {
        assert_eq!(
            Catalog::bundled().names(),
            vec!["main", "testapp", "reader", "images"]
        );
    }

    #[test]
    fn test_launch_renders_title_heading() {
        let t = env();
        let catalog = Catalog::bundled();
        let app = launch(catalog.get("main").unwrap().as_ref(), t.env.clone(), &context()).unwrap();
        assert!(app.is_alive());
        assert_eq!(
            t.surface.ops(0),
            vec![fxi_kernel::RenderOp::Heading(
                fxi_api::ElementId(0),
                fxi_api::HeadingLevel::H1,
                "main".into()
            )]
        );
    }

    #[test]
    fn test_failed_init_quits_the_instance() {
        let t = env();
        let Err(err) = launch(&Broken, t.env.clone(), &context()) else {
            panic!("init of a broken module should fail");
        };
        assert!(format!("{:#}", err).contains("broken: init failed"));
        assert_eq!(t.surface.ops(0), vec![fxi_kernel::RenderOp::Destroy]);
    }
}
