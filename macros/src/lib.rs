mod route;

use proc_macro::TokenStream;

/// Generates an `aide` documentation function for a handler, named after the
/// handler with the suffix `_docs`.
///
/// The first paragraph of the doc comment becomes the operation summary and
/// the rest its description. Accepts any number of `tag = <expr>` and
/// `response(status = <int>, shape = "<type>", description = "<text>")` arguments.
#[proc_macro_attribute]
pub fn route(args: TokenStream, input: TokenStream) -> TokenStream {
	route::from_input(args, input)
}
