
use clap::Parser;
use clap::Subcommand;

use crate::errors::CommandError;
use crate::progress::ProgressObserver;

mod search;
mod create;
mod edit;
mod export;

use search::Search;
use create::Create;
use create::AddEditType;
use edit::Copy;
use edit::Merge;
use edit::Buffer;
use edit::ClipInfluence;
use edit::ClipZone;
use export::Export;


pub(crate) trait Task {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError>;

}

#[macro_export]
macro_rules! command_def {
    ($struct_name: ident {$($command_name: ident),*}) => {

        #[derive(Subcommand)]
        pub(crate) enum $struct_name {
            $(
                $command_name($command_name)
            ),*
        }

        impl Task for $struct_name {

            fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {
                match self {
                    $(Self::$command_name(a) => a.run(progress)),*
                }
            }

        }
    };
}

#[macro_export]
macro_rules! subcommand_def {
    (#[doc = $doc: literal] $(#[$attr: meta])* $visibility: vis struct $name: ident {$($body: tt)*}) => {
        #[doc = $doc]
        #[derive(clap::Args)]
        $(#[$attr])*
        $visibility struct $name {
            $($body)*
        }
    };
}

command_def!{
    MainCommand {
        Search,
        Create,
        AddEditType,
        Copy,
        Merge,
        Buffer,
        ClipInfluence,
        ClipZone,
        Export
    }
}

/// Prepares cadastral graphics for submission to the ISeD register.
#[derive(Parser)]
#[command(author,version)]
pub(crate) struct Kataster {

    #[command(subcommand)]
    command: MainCommand

}

impl Task for Kataster {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {
        self.command.run(progress)
    }

}
