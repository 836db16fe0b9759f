use darling::{ast, FromMeta};
use proc_macro::TokenStream;
use quote::{format_ident, quote};

#[derive(FromMeta)]
struct RouteArgs {
	#[darling(multiple)]
	tag: Vec<syn::Expr>,
	#[darling(multiple)]
	response: Vec<ResponseArgs>,
}

#[derive(FromMeta)]
struct ResponseArgs {
	status: syn::LitInt,
	shape: Option<syn::Type>,
	description: Option<String>,
}

pub fn from_input(args: TokenStream, input: TokenStream) -> TokenStream {
	let args = match ast::NestedMeta::parse_meta_list(args.into()) {
		Ok(x) => x,
		Err(e) => return e.into_compile_error().into(),
	};

	let args = match RouteArgs::from_list(&args) {
		Ok(x) => x,
		Err(e) => return e.write_errors().into(),
	};

	let function = syn::parse_macro_input!(input as syn::ItemFn);

	let Some((summary, description)) = doc_comment(&function.attrs) else {
		return syn::Error::new_spanned(
			&function.sig.ident,
			"#[route] handlers need a doc comment; its first line is used as the summary",
		)
		.into_compile_error()
		.into();
	};

	let fn_name = format_ident!("{}_docs", function.sig.ident);
	let fn_vis = &function.vis;

	let description = description.unwrap_or_else(|| summary.clone());
	let tags = args.tag.iter();
	let responses = args.response.into_iter().map(|response| {
		let status = response.status;
		let shape = response.shape.map_or_else(|| quote!(()), |x| quote!(#x));

		match response.description {
			Some(description) => quote! {
				.response_with::<#status, #shape, _>(|res| res.description(#description))
			},
			None => quote! {
				.response::<#status, #shape>()
			},
		}
	});

	quote! {
		#function

		#fn_vis fn #fn_name(op: aide::transform::TransformOperation) -> aide::transform::TransformOperation {
			op.summary(#summary).description(#description)
				#(
					.tag(#tags)
				)*
				#(
					#responses
				)*
		}
	}
	.into()
}

/// Splits the doc comment into its first line and the remaining lines.
fn doc_comment(attrs: &[syn::Attribute]) -> Option<(String, Option<String>)> {
	let mut lines = attrs.iter().filter_map(|attr| {
		let syn::Meta::NameValue(doc) = &attr.meta else {
			return None;
		};

		if !doc.path.is_ident("doc") {
			return None;
		}

		match &doc.value {
			syn::Expr::Lit(syn::ExprLit {
				lit: syn::Lit::Str(literal),
				..
			}) => Some(literal.value().trim().to_owned()),
			_ => None,
		}
	});

	let summary = lines.by_ref().find(|line| !line.is_empty())?;
	let rest = lines
		.filter(|line| !line.is_empty())
		.collect::<Vec<_>>()
		.join(" ");

	Some((summary, (!rest.is_empty()).then_some(rest)))
}
