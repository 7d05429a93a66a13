//! The always-present home application.

use fxi_kernel::CommandRegistry;

use super::{AppContext, AppModule};

pub struct MainApp;

impl AppModule for MainApp {
    fn name(&self) -> &'static str {
        "main"
    }

    fn description(&self) -> &'static str {
        "Lists the available applications"
    }

    fn commands(&self, ctx: &AppContext) -> CommandRegistry {
        let available = ctx.available.clone();
        let mut commands = CommandRegistry::new();
        commands.register("ls", Some("List available applications"), move |app, _| {
            let monitor = app.open_monitor(Some("ls"));
            for name in &available {
                monitor.write(name);
            }
            Ok(())
        });
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::super::launch;
    use super::super::test_env::{context, env};
    use super::*;

    #[test]
    fn test_ls_lists_catalog() {
        let t = env();
        let app = launch(&MainApp, t.env.clone(), &context()).unwrap();
        app.handle_command("ls", vec![]).unwrap().join().unwrap();

        let lines: Vec<String> = app
            .current_monitor()
            .unwrap()
            .lines()
            .iter()
            .filter_map(|l| l.text().map(str::to_string))
            .collect();
        assert_eq!(lines, vec!["ls", "main", "testapp", "reader", "images"]);
    }
}
